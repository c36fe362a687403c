//! 将探测器模型展开为几何后端可直接消费的值类型描述。
//!
//! 所有位置均相对包络盒（wrapper）的几何中心给出；后端负责创建实体与放置，
//! 这里不持有任何后端资源。

use glam::{DVec2, UVec2};
use pixdet_core::DetectorModel;
use pixdet_core::geometry::{Point3, Vector2, Vector3};
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::PlanError;

/// 芯片厚度低于该值时不生成芯片体。
const MIN_CHIP_THICKNESS: f64 = 1e-9;

const SENSOR_MATERIAL: &str = "silicon";
const WORLD_MATERIAL: &str = "world_material";
const BUMP_MATERIAL: &str = "solder";

/// 一个长方体的放置：尺寸、相对包络中心的位置与材料。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlacement {
    pub name: String,
    pub size: Vector3,
    pub position: Vector3,
    pub material: String,
}

/// 规则网格：单元数量、间距以及网格左下角（相对所属体中心）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLayout {
    pub count: UVec2,
    pub pitch: Vector2,
    pub origin: Vector2,
}

impl GridLayout {
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.count.x as usize * self.count.y as usize
    }

    /// 单元 `(x, y)` 的中心。
    pub fn cell_center(&self, x: u32, y: u32) -> Vector2 {
        let index = DVec2::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
        Vector2(self.origin.as_vec2() + index * self.pitch.as_vec2())
    }

    /// 以 x 为外层、y 为内层依次给出所有单元中心。
    pub fn cell_centers(&self) -> impl Iterator<Item = Vector2> + '_ {
        (0..self.count.x).flat_map(move |x| (0..self.count.y).map(move |y| self.cell_center(x, y)))
    }
}

/// 从传感器体中挖出并填充注入区材料的注入区阵列。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplantGrid {
    pub size: Vector3,
    pub material: String,
    pub grid: GridLayout,
    /// 注入区相对像素单元中心的平面偏移。
    pub offset: Vector2,
    /// 注入区中心相对传感器中心的 z 偏移，注入区贴合芯片侧表面。
    pub depth_offset: f64,
}

impl ImplantGrid {
    /// 各注入区相对传感器中心的位置。
    pub fn positions(&self) -> impl Iterator<Item = Vector3> + '_ {
        self.grid.cell_centers().map(move |cell| {
            let xy = cell.as_vec2() + self.offset.as_vec2();
            Vector3::new(xy.x, xy.y, self.depth_offset)
        })
    }
}

/// 支撑层上的开孔：尺寸与相对支撑层中心的平移。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoleCut {
    pub size: Vector3,
    pub translation: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportPlacement {
    pub volume: BoxPlacement,
    pub hole: Option<HoleCut>,
}

/// 混合式探测器的凸点阵列。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BumpGrid {
    /// 容纳全部凸点的外包盒，本身以环境材料填充。
    pub region: BoxPlacement,
    pub material: String,
    pub sphere_radius: f64,
    pub cylinder_radius: f64,
    pub height: f64,
    pub grid: GridLayout,
}

/// 一个探测器实例的完整构建计划。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstructionPlan {
    pub name: String,
    pub wrapper: BoxPlacement,
    /// 参考中心相对几何中心的位移；放置包络盒时需从探测器位置中减去。
    pub wrapper_translation: Vector3,
    pub sensor: BoxPlacement,
    pub pixels: GridLayout,
    pub implants: Option<ImplantGrid>,
    pub chip: Option<BoxPlacement>,
    pub supports: Vec<SupportPlacement>,
    pub bumps: Option<BumpGrid>,
}

impl ConstructionPlan {
    pub fn build(name: &str, model: &DetectorModel) -> Self {
        let geometric = model.geometrical_center();
        let relative = |point: Point3| geometric.vector_to(point);

        debug!(name, size = ?model.size(), "包络尺寸");
        trace!(sensor = ?model.sensor_size(), chip = ?model.chip_size(), "传感器与芯片尺寸");

        let wrapper = BoxPlacement {
            name: format!("wrapper_{name}"),
            size: model.size(),
            position: Vector3::ZERO,
            material: WORLD_MATERIAL.to_string(),
        };
        let wrapper_translation = geometric.vector_to(model.center());

        let sensor_center = model.sensor_center();
        let sensor = BoxPlacement {
            name: format!("sensor_{name}"),
            size: model.sensor_size(),
            position: relative(sensor_center),
            material: SENSOR_MATERIAL.to_string(),
        };
        debug!(position = ?sensor.position, "传感器位置");

        // 像素网格相对传感器中心；传感器外延不对称时网格并不居中。
        let grid = model.grid_size();
        let grid_shift = sensor_center.vector_to(model.center());
        let pixels = GridLayout {
            count: model.n_pixels(),
            pitch: model.pixel_size(),
            origin: Vector2::new(
                grid_shift.x() - grid.x() / 2.0,
                grid_shift.y() - grid.y() / 2.0,
            ),
        };

        let implant_size = model.implant_size();
        let implants = (implant_size.z() > f64::EPSILON).then(|| {
            trace!("注入区具有非零深度，需要从传感器体中挖除");
            ImplantGrid {
                size: implant_size,
                material: model.implant_material().to_string(),
                grid: pixels,
                offset: model.implant_offset(),
                depth_offset: (model.sensor_size().z() - implant_size.z()) / 2.0,
            }
        });

        let chip_size = model.chip_size();
        let chip = (chip_size.z() > MIN_CHIP_THICKNESS).then(|| BoxPlacement {
            name: format!("chip_{name}"),
            size: chip_size,
            position: relative(model.chip_center()),
            material: SENSOR_MATERIAL.to_string(),
        });
        if let Some(chip) = &chip {
            debug!(position = ?chip.position, "芯片位置");
        }

        let supports: Vec<SupportPlacement> = model
            .support_layers()
            .into_iter()
            .enumerate()
            .map(|(index, layer)| {
                let hole = layer.has_hole().then(|| {
                    // z 方向加倍，避免与支撑层表面重合。
                    let hole_size = layer.hole_size();
                    HoleCut {
                        size: Vector3::new(hole_size.x(), hole_size.y(), 2.0 * hole_size.z()),
                        translation: layer.center().vector_to(layer.hole_center()),
                    }
                });
                let placement = SupportPlacement {
                    volume: BoxPlacement {
                        name: format!("support_{name}_{index}"),
                        size: layer.size(),
                        position: relative(layer.center()),
                        material: layer.material().to_string(),
                    },
                    hole,
                };
                debug!(index, position = ?placement.volume.position, "支撑层位置");
                placement
            })
            .collect();

        let bumps = match (model.bump_bonds(), model.bumps_center(), model.bumps_size()) {
            (Some(bonds), Some(center), Some(size)) => {
                let bumps = BumpGrid {
                    region: BoxPlacement {
                        name: format!("bump_box_{name}"),
                        size,
                        position: relative(center),
                        material: WORLD_MATERIAL.to_string(),
                    },
                    material: BUMP_MATERIAL.to_string(),
                    sphere_radius: bonds.sphere_radius(),
                    cylinder_radius: bonds.cylinder_radius(),
                    height: bonds.height(),
                    // 凸点层已随凸点偏移整体平移，网格在其内部居中。
                    grid: GridLayout {
                        count: model.n_pixels(),
                        pitch: model.pixel_size(),
                        origin: Vector2::new(-grid.x() / 2.0, -grid.y() / 2.0),
                    },
                };
                debug!(position = ?bumps.region.position, "凸点层位置");
                Some(bumps)
            }
            _ => None,
        };

        debug!(
            name,
            supports = supports.len(),
            implants = implants.is_some(),
            chip = chip.is_some(),
            bumps = bumps.is_some(),
            "构建计划完成"
        );

        Self {
            name: name.to_string(),
            wrapper,
            wrapper_translation,
            sensor,
            pixels,
            implants,
            chip,
            supports,
            bumps,
        }
    }

    /// 给定探测器的全局位置，返回包络盒应放置的位置（不含旋转）。
    pub fn wrapper_position(&self, detector_position: Point3) -> Point3 {
        let shift = self.wrapper_translation.as_vec3();
        Point3(detector_position.as_vec3() - shift)
    }

    /// 列出计划中每个部件及其材料。
    pub fn materials(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let implants = self
            .implants
            .as_ref()
            .map(|implants| ("implants", implants.material.as_str()));
        let bumps = self
            .bumps
            .as_ref()
            .map(|bumps| ("bumps", bumps.material.as_str()));
        let parts = [Some(&self.wrapper), Some(&self.sensor), self.chip.as_ref()]
            .into_iter()
            .flatten()
            .chain(self.supports.iter().map(|support| &support.volume))
            .chain(self.bumps.iter().map(|bumps| &bumps.region))
            .map(|placement| (placement.name.as_str(), placement.material.as_str()));
        implants.into_iter().chain(parts).chain(bumps)
    }

    /// 检查所有部件的材料是否均可由后端提供。
    pub fn verify_materials<S: AsRef<str>>(&self, known: &[S]) -> Result<(), PlanError> {
        for (part, material) in self.materials() {
            if !known.iter().any(|candidate| candidate.as_ref() == material) {
                return Err(PlanError::UnknownMaterial {
                    material: material.to_string(),
                    part: part.to_string(),
                });
            }
        }
        Ok(())
    }
}
