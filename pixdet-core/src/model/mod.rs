//! 像素探测器的参数化几何模型。
//!
//! 模型由配置一次性构建并校验，之后不可变；支撑层中心、包络尺寸等派生量
//! 每次查询时重新计算。

mod envelope;
mod hybrid;
mod support;

use glam::{DVec2, DVec3, UVec2};
use pixdet_config::{ConfigError, ConfigReader, Configuration};
use thiserror::Error;
use tracing::{debug, trace};

use crate::geometry::{Point3, Vector2, Vector3};

pub use hybrid::BumpBonds;
pub use support::{SupportLayer, SupportLocation};

use support::DeclaredSupport;

const SUPPORT_SECTION: &str = "support";
const DEFAULT_IMPLANT_MATERIAL: &str = "aluminum";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("配置段 {section} 中 `{key}` 的值无效：{reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
    #[error("配置段 {section} 中 `{key}` 的取值 `{value}` 无效，可选值：{allowed}")]
    InvalidEnumValue {
        section: String,
        key: String,
        value: String,
        allowed: &'static str,
    },
}

impl ModelError {
    pub(crate) fn invalid_value(
        section: &Configuration,
        key: &str,
        reason: impl Into<String>,
    ) -> Self {
        ModelError::InvalidValue {
            section: section.label(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// 出错的配置键（若能确定）。
    pub fn key(&self) -> Option<&str> {
        match self {
            ModelError::Config(ConfigError::MissingKey { key, .. })
            | ModelError::Config(ConfigError::SchemaMismatch { key, .. })
            | ModelError::InvalidValue { key, .. }
            | ModelError::InvalidEnumValue { key, .. } => Some(key.as_str()),
            ModelError::Config(_) => None,
        }
    }
}

/// 模型种类：单片式或混合式（带凸点键合层）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Monolithic,
    Hybrid,
}

impl ModelKind {
    pub const ALLOWED: &'static str = "'monolithic'、'hybrid'";

    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "monolithic" => Some(ModelKind::Monolithic),
            "hybrid" => Some(ModelKind::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Monolithic => "monolithic",
            ModelKind::Hybrid => "hybrid",
        }
    }
}

/// 传感器相对像素阵列四边的外延量。
#[derive(Debug, Clone, Copy, PartialEq)]
struct SensorExcess {
    top: f64,
    bottom: f64,
    left: f64,
    right: f64,
}

impl SensorExcess {
    /// 外延不对称带来的平面中心偏移。
    #[inline]
    fn center_shift(&self) -> DVec2 {
        DVec2::new((self.right - self.left) / 2.0, (self.top - self.bottom) / 2.0)
    }

    #[inline]
    fn total(&self) -> DVec2 {
        DVec2::new(self.left + self.right, self.top + self.bottom)
    }
}

/// 经过校验的探测器几何模型，构建后不可变。
#[derive(Debug, Clone)]
pub struct DetectorModel {
    model_type: String,
    kind: ModelKind,
    reader: ConfigReader,
    n_pixels: UVec2,
    pixel_size: Vector2,
    sensor_thickness: f64,
    sensor_excess: SensorExcess,
    implant_size: Vector3,
    implant_material: String,
    implant_offset: Vector2,
    chip_thickness: f64,
    supports: Vec<DeclaredSupport>,
    bump_bonds: Option<BumpBonds>,
}

impl DetectorModel {
    /// 从配置构建模型。任何校验失败都会使构建整体失败。
    pub fn new(model_type: impl Into<String>, reader: ConfigReader) -> Result<Self, ModelError> {
        let model_type = model_type.into();
        let config = reader.header_configuration();

        let kind_token = config.get_or("type", ModelKind::Monolithic.as_str().to_string())?;
        let kind = ModelKind::parse(&kind_token).ok_or_else(|| ModelError::InvalidEnumValue {
            section: config.label(),
            key: "type".to_string(),
            value: kind_token.clone(),
            allowed: ModelKind::ALLOWED,
        })?;

        let n_pixels = config.get::<UVec2>("number_of_pixels")?;
        let pixel_size = config.get::<DVec2>("pixel_size")?;
        let sensor_thickness = config.get::<f64>("sensor_thickness")?;

        let default_excess = config.get_or("sensor_excess", 0.0)?;
        let sensor_excess = SensorExcess {
            top: config.get_or("sensor_excess_top", default_excess)?,
            bottom: config.get_or("sensor_excess_bottom", default_excess)?,
            left: config.get_or("sensor_excess_left", default_excess)?,
            right: config.get_or("sensor_excess_right", default_excess)?,
        };

        let implant_size = read_implant_size(&config, pixel_size)?;
        if implant_size.x > pixel_size.x || implant_size.y > pixel_size.y {
            return Err(ModelError::invalid_value(
                &config,
                "implant_size",
                "注入区尺寸不能大于像素间距",
            ));
        }
        if implant_size.z > sensor_thickness {
            return Err(ModelError::invalid_value(
                &config,
                "implant_size",
                "注入区深度不能大于传感器厚度",
            ));
        }
        let implant_material =
            config.get_or("implant_material", DEFAULT_IMPLANT_MATERIAL.to_string())?;

        let implant_offset = config.get_or("implant_offset", DVec2::ZERO)?;
        if implant_offset.x.abs() + implant_size.x / 2.0 > pixel_size.x / 2.0
            || implant_offset.y.abs() + implant_size.y / 2.0 > pixel_size.y / 2.0
        {
            return Err(ModelError::invalid_value(
                &config,
                "implant_offset",
                "注入区超出像素单元，请减小注入区尺寸或偏移",
            ));
        }

        let chip_thickness = config.get_or("chip_thickness", 0.0)?;

        let supports = reader
            .configurations_named(SUPPORT_SECTION)
            .map(DeclaredSupport::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        for (index, support) in supports.iter().enumerate() {
            trace!(
                index,
                location = support.location.as_str(),
                thickness = support.size.z,
                material = %support.material,
                "读取支撑层"
            );
        }

        let bump_bonds = match kind {
            ModelKind::Hybrid => Some(BumpBonds::from_config(&config, pixel_size)?),
            ModelKind::Monolithic => None,
        };

        debug!(
            model = %model_type,
            kind = kind.as_str(),
            pixels_x = n_pixels.x,
            pixels_y = n_pixels.y,
            supports = supports.len(),
            "探测器模型构建完成"
        );

        Ok(Self {
            model_type,
            kind,
            reader,
            n_pixels,
            pixel_size: Vector2(pixel_size),
            sensor_thickness,
            sensor_excess,
            implant_size: Vector3(implant_size),
            implant_material,
            implant_offset: Vector2(implant_offset),
            chip_thickness,
            supports,
            bump_bonds,
        })
    }

    #[inline]
    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    #[inline]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// 全局段（合并所有未命名段，后者覆盖前者）在前，其余命名段按原顺序跟随。
    pub fn configurations(&self) -> Vec<Configuration> {
        let mut global = self.reader.header_configuration();
        let mut named = Vec::new();
        for config in self.reader.configurations() {
            if config.is_global() {
                global.merge(config);
            } else {
                named.push(config.clone());
            }
        }

        let mut configurations = Vec::with_capacity(named.len() + 1);
        configurations.push(global);
        configurations.extend(named);
        configurations
    }

    #[inline]
    pub fn n_pixels(&self) -> UVec2 {
        self.n_pixels
    }

    #[inline]
    pub fn pixel_size(&self) -> Vector2 {
        self.pixel_size
    }

    /// 像素阵列的平面尺寸（z 为 0）。
    pub fn grid_size(&self) -> Vector3 {
        Vector3::new(
            f64::from(self.n_pixels.x) * self.pixel_size.x(),
            f64::from(self.n_pixels.y) * self.pixel_size.y(),
            0.0,
        )
    }

    /// 模型的参考中心（亦即旋转中心）：像素阵列中心，坐标原点位于第一个像素中心。
    pub fn center(&self) -> Point3 {
        let grid = self.grid_size();
        Point3::new(
            grid.x() / 2.0 - self.pixel_size.x() / 2.0,
            grid.y() / 2.0 - self.pixel_size.y() / 2.0,
            0.0,
        )
    }

    /// 像素 `(x, y)` 的中心坐标。
    pub fn pixel_center(&self, x: u32, y: u32) -> Point3 {
        Point3::new(
            f64::from(x) * self.pixel_size.x(),
            f64::from(y) * self.pixel_size.y(),
            0.0,
        )
    }

    #[inline]
    pub fn sensor_thickness(&self) -> f64 {
        self.sensor_thickness
    }

    #[inline]
    pub fn sensor_excess_top(&self) -> f64 {
        self.sensor_excess.top
    }

    #[inline]
    pub fn sensor_excess_bottom(&self) -> f64 {
        self.sensor_excess.bottom
    }

    #[inline]
    pub fn sensor_excess_left(&self) -> f64 {
        self.sensor_excess.left
    }

    #[inline]
    pub fn sensor_excess_right(&self) -> f64 {
        self.sensor_excess.right
    }

    pub fn sensor_size(&self) -> Vector3 {
        let grid = self.grid_size().as_vec3();
        let excess = self.sensor_excess.total();
        Vector3(grid + DVec3::new(excess.x, excess.y, self.sensor_thickness))
    }

    pub fn sensor_center(&self) -> Point3 {
        let shift = self.sensor_excess.center_shift();
        self.center().translate(shift.extend(0.0).into())
    }

    #[inline]
    pub fn chip_thickness(&self) -> f64 {
        self.chip_thickness
    }

    pub fn chip_size(&self) -> Vector3 {
        let sensor = self.sensor_size();
        Vector3::new(sensor.x(), sensor.y(), self.chip_thickness)
    }

    /// 读出芯片中心；混合式模型中芯片被凸点高度整体抬离传感器。
    pub fn chip_center(&self) -> Point3 {
        let shift = self.sensor_excess.center_shift();
        let z = self.sensor_thickness / 2.0 + self.bump_height() + self.chip_thickness / 2.0;
        self.center().translate(shift.extend(z).into())
    }

    #[inline]
    pub fn implant_size(&self) -> Vector3 {
        self.implant_size
    }

    #[inline]
    pub fn implant_offset(&self) -> Vector2 {
        self.implant_offset
    }

    #[inline]
    pub fn implant_material(&self) -> &str {
        &self.implant_material
    }

    /// 混合式模型的凸点键合参数；单片式模型返回 `None`。
    #[inline]
    pub fn bump_bonds(&self) -> Option<&BumpBonds> {
        self.bump_bonds.as_ref()
    }

    #[inline]
    fn bump_height(&self) -> f64 {
        self.bump_bonds.as_ref().map_or(0.0, |bumps| bumps.height())
    }
}

/// 先尝试读取三维注入区尺寸；仅当键缺失或形态不符时退回二维面积（默认整个像素），深度取 0。
fn read_implant_size(config: &Configuration, pixel_size: DVec2) -> Result<DVec3, ModelError> {
    match config.get::<DVec3>("implant_size") {
        Ok(size) => Ok(size),
        Err(err) if err.is_schema_failure() => {
            let area = config.get_or("implant_size", pixel_size)?;
            Ok(area.extend(0.0))
        }
        Err(err) => Err(err.into()),
    }
}
