use glam::DVec2;
use pixdet_config::Configuration;
use serde::{Deserialize, Serialize};

use super::{DetectorModel, ModelError};
use crate::geometry::{Point3, Vector2, Vector3};

/// 混合式探测器中连接传感器与读出芯片的凸点键合参数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BumpBonds {
    sphere_radius: f64,
    cylinder_radius: f64,
    height: f64,
    offset: Vector2,
}

impl BumpBonds {
    pub(crate) fn from_config(
        config: &Configuration,
        pixel_size: DVec2,
    ) -> Result<Self, ModelError> {
        let sphere_radius = config.get_or("bump_sphere_radius", 0.0)?;
        let cylinder_radius = config.get::<f64>("bump_cylinder_radius")?;
        let height = config.get::<f64>("bump_height")?;

        let offset = config.get_or("bump_offset", DVec2::ZERO)?;
        if offset.x.abs() > pixel_size.x / 2.0 || offset.y.abs() > pixel_size.y / 2.0 {
            return Err(ModelError::invalid_value(
                config,
                "bump_offset",
                "凸点偏移不能大于半个像素间距",
            ));
        }

        Ok(Self {
            sphere_radius,
            cylinder_radius,
            height,
            offset: Vector2(offset),
        })
    }

    #[inline]
    pub fn sphere_radius(&self) -> f64 {
        self.sphere_radius
    }

    #[inline]
    pub fn cylinder_radius(&self) -> f64 {
        self.cylinder_radius
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// 凸点阵列相对像素中心的平面偏移。
    #[inline]
    pub fn offset(&self) -> Vector2 {
        self.offset
    }
}

impl DetectorModel {
    /// 凸点层中心，仅混合式模型存在。
    pub fn bumps_center(&self) -> Option<Point3> {
        let bumps = self.bump_bonds.as_ref()?;
        let z = self.sensor_thickness / 2.0 + bumps.height / 2.0;
        Some(self.center().translate(bumps.offset.extend(z)))
    }

    /// 凸点层外包盒：与传感器等大，厚度为凸点高度。
    pub fn bumps_size(&self) -> Option<Vector3> {
        let bumps = self.bump_bonds.as_ref()?;
        let sensor = self.sensor_size();
        Some(Vector3::new(sensor.x(), sensor.y(), bumps.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, SupportLocation};
    use pixdet_config::{ConfigError, ConfigReader};

    fn hybrid_header() -> Configuration {
        Configuration::global()
            .with("type", "hybrid")
            .with("number_of_pixels", vec![2, 2])
            .with("pixel_size", vec![0.055, 0.055])
            .with("sensor_thickness", 0.3)
            .with("chip_thickness", 0.1)
            .with("bump_sphere_radius", 0.009)
            .with("bump_cylinder_radius", 0.007)
            .with("bump_height", 0.02)
    }

    #[test]
    fn hybrid_models_expose_bump_bonds() {
        let model =
            DetectorModel::new("timepix", ConfigReader::from_sections([hybrid_header()])).unwrap();
        assert_eq!(model.kind(), ModelKind::Hybrid);
        let bumps = model.bump_bonds().expect("hybrid model has bumps");
        assert_eq!(bumps.sphere_radius(), 0.009);
        assert_eq!(bumps.cylinder_radius(), 0.007);
        assert_eq!(bumps.height(), 0.02);
        assert_eq!(bumps.offset(), Vector2::ZERO);

        let center = model.bumps_center().expect("bumps center");
        assert!((center.z() - 0.16).abs() < 1e-12);
        assert!((model.chip_center().z() - (0.15 + 0.02 + 0.05)).abs() < 1e-12);
        assert_eq!(model.bumps_size().map(|s| s.z()), Some(0.02));
    }

    #[test]
    fn monolithic_models_have_no_bump_geometry() {
        let header = hybrid_header().with("type", "monolithic");
        let model = DetectorModel::new("m", ConfigReader::from_sections([header])).unwrap();
        assert!(model.bump_bonds().is_none());
        assert!(model.bumps_center().is_none());
        assert!(model.bumps_size().is_none());
        assert!((model.chip_center().z() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn bump_height_is_required_for_hybrids() {
        let header = Configuration::global()
            .with("type", "Hybrid")
            .with("number_of_pixels", vec![2, 2])
            .with("pixel_size", vec![0.055, 0.055])
            .with("sensor_thickness", 0.3)
            .with("bump_cylinder_radius", 0.007);
        let err = DetectorModel::new("m", ConfigReader::from_sections([header])).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Config(ConfigError::MissingKey { ref key, .. }) if key == "bump_height"
        ));
    }

    #[test]
    fn bump_offset_is_limited_to_half_pitch() {
        let header = hybrid_header().with("bump_offset", vec![0.03, 0.0]);
        let err = DetectorModel::new("m", ConfigReader::from_sections([header])).unwrap_err();
        assert_eq!(err.key(), Some("bump_offset"));
    }

    #[test]
    fn chip_side_supports_clear_the_bump_layer() {
        let reader = ConfigReader::from_sections([
            hybrid_header(),
            Configuration::new("support")
                .with("thickness", 1.0)
                .with("size", vec![1.0, 1.0]),
        ]);
        let model = DetectorModel::new("m", reader).unwrap();
        let layer = &model.support_layers()[0];
        assert_eq!(layer.location(), SupportLocation::Chip);
        assert!((layer.center().z() - (0.15 + 0.02 + 0.1 + 0.5)).abs() < 1e-12);
    }
}
