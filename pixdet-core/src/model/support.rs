use std::fmt;

use glam::{DVec2, DVec3};
use pixdet_config::Configuration;
use serde::{Deserialize, Serialize};

use super::{DetectorModel, ModelError};
use crate::geometry::{Point3, Vector2, Vector3};

/// 开孔尺寸低于该值视为无孔。
const HOLE_EPSILON: f64 = 1e-9;

/// 支撑层的堆叠位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLocation {
    /// 从传感器正面向外堆叠。
    Sensor,
    /// 从芯片背面向外堆叠。
    Chip,
    /// 使用声明的三维偏移，不参与堆叠。
    Absolute,
}

impl SupportLocation {
    pub const ALLOWED: &'static str = "'chip'、'sensor'、'absolute'";

    /// 大小写不敏感地解析位置标记。
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "sensor" => Some(SupportLocation::Sensor),
            "chip" => Some(SupportLocation::Chip),
            "absolute" => Some(SupportLocation::Absolute),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SupportLocation::Sensor => "sensor",
            SupportLocation::Chip => "chip",
            SupportLocation::Absolute => "absolute",
        }
    }
}

impl fmt::Display for SupportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置中声明的支撑层，中心尚未求解。
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeclaredSupport {
    pub(crate) size: DVec3,
    pub(crate) offset: DVec3,
    pub(crate) material: String,
    pub(crate) location: SupportLocation,
    pub(crate) hole_size: DVec2,
    pub(crate) hole_offset: DVec2,
}

impl DeclaredSupport {
    pub(crate) fn from_config(section: &Configuration) -> Result<Self, ModelError> {
        let thickness = section.get::<f64>("thickness")?;
        let size = section.get::<DVec2>("size")?;

        let token = section
            .get_or("location", SupportLocation::Chip.as_str().to_string())?
            .to_lowercase();
        let location =
            SupportLocation::parse(&token).ok_or_else(|| ModelError::InvalidEnumValue {
                section: section.label(),
                key: "location".to_string(),
                value: token.clone(),
                allowed: SupportLocation::ALLOWED,
            })?;

        let offset = match location {
            SupportLocation::Absolute => section.get::<DVec3>("offset")?,
            SupportLocation::Sensor | SupportLocation::Chip => {
                section.get_or("offset", DVec2::ZERO)?.extend(0.0)
            }
        };

        let material = section.get_or("material", "g10".to_string())?.to_lowercase();
        let hole_size = section.get_or("hole_size", DVec2::ZERO)?;
        let hole_offset = section.get_or("hole_offset", DVec2::ZERO)?;

        Ok(Self {
            size: size.extend(thickness),
            offset,
            material,
            location,
            hole_size,
            hole_offset,
        })
    }
}

/// 已求解中心的支撑层，由 [`DetectorModel::support_layers`] 每次重新生成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportLayer {
    size: Vector3,
    offset: Vector3,
    material: String,
    location: SupportLocation,
    hole_size: Vector2,
    hole_offset: Vector2,
    center: Point3,
}

impl SupportLayer {
    /// 尺寸：平面大小与厚度。
    #[inline]
    pub fn size(&self) -> Vector3 {
        self.size
    }

    #[inline]
    pub fn thickness(&self) -> f64 {
        self.size.z()
    }

    #[inline]
    pub fn location(&self) -> SupportLocation {
        self.location
    }

    #[inline]
    pub fn material(&self) -> &str {
        &self.material
    }

    /// 相对模型中心的偏移；sensor/chip 层的 z 分量由堆叠求得。
    #[inline]
    pub fn offset(&self) -> Vector3 {
        self.offset
    }

    #[inline]
    pub fn center(&self) -> Point3 {
        self.center
    }

    pub fn has_hole(&self) -> bool {
        self.hole_size.x() > HOLE_EPSILON && self.hole_size.y() > HOLE_EPSILON
    }

    /// 开孔尺寸，z 方向与支撑层同厚。
    pub fn hole_size(&self) -> Vector3 {
        self.hole_size.extend(self.thickness())
    }

    #[inline]
    pub fn hole_offset(&self) -> Vector2 {
        self.hole_offset
    }

    pub fn hole_center(&self) -> Point3 {
        self.center.translate(self.hole_offset.extend(0.0))
    }
}

impl DetectorModel {
    /// 按声明顺序求解所有支撑层的中心。
    ///
    /// 传感器侧与芯片侧各自维护一个累加偏移，同侧的层依声明顺序逐层向外堆叠；
    /// absolute 层直接使用声明的三维偏移，不影响任何累加器。
    pub fn support_layers(&self) -> Vec<SupportLayer> {
        let center = self.center();
        let mut sensor_offset = -self.sensor_thickness / 2.0;
        let mut chip_offset =
            self.sensor_thickness / 2.0 + self.bump_height() + self.chip_thickness;

        self.supports
            .iter()
            .map(|declared| {
                let thickness = declared.size.z;
                let mut offset = declared.offset;
                match declared.location {
                    SupportLocation::Sensor => {
                        offset.z = sensor_offset - thickness / 2.0;
                        sensor_offset -= thickness;
                    }
                    SupportLocation::Chip => {
                        offset.z = chip_offset + thickness / 2.0;
                        chip_offset += thickness;
                    }
                    SupportLocation::Absolute => {}
                }

                SupportLayer {
                    size: Vector3(declared.size),
                    offset: Vector3(offset),
                    material: declared.material.clone(),
                    location: declared.location,
                    hole_size: Vector2(declared.hole_size),
                    hole_offset: Vector2(declared.hole_offset),
                    center: center.translate(Vector3(offset)),
                }
            })
            .collect()
    }
}
