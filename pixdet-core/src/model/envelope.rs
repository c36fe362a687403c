use super::DetectorModel;
use crate::geometry::{Bounds3D, Point3, Vector3};

impl DetectorModel {
    /// 传感器、芯片、凸点层（若有）与全部支撑层的真实轴对齐包络。
    fn envelope(&self) -> Bounds3D {
        let mut bounds = Bounds3D::empty();
        bounds.include_box(self.sensor_center(), self.sensor_size());
        bounds.include_box(self.chip_center(), self.chip_size());
        if let (Some(center), Some(size)) = (self.bumps_center(), self.bumps_size()) {
            bounds.include_box(center, size);
        }
        for layer in self.support_layers() {
            bounds.include_box(layer.center(), layer.size());
        }
        bounds
    }

    /// 包络尺寸，以 [`DetectorModel::center`] 为参考。
    ///
    /// x/y 取两侧较大的单侧外延并镜像，得到关于中心对称的盒体；
    /// z 为两侧真实外延之和（正向为芯片侧，负向为传感器侧），不做对称化。
    pub fn size(&self) -> Vector3 {
        let bounds = self.envelope();
        let center = self.center();
        let (min, max) = (bounds.min(), bounds.max());

        Vector3::new(
            2.0 * (max.x() - center.x()).max(center.x() - min.x()),
            2.0 * (max.y() - center.y()).max(center.y() - min.y()),
            (max.z() - center.z()) + (center.z() - min.z()),
        )
    }

    /// 真实包络的几何中心；布局不对称时与参考中心不重合。
    pub fn geometrical_center(&self) -> Point3 {
        self.envelope().center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixdet_config::{ConfigReader, Configuration};

    fn header() -> Configuration {
        Configuration::global()
            .with("number_of_pixels", vec![4, 4])
            .with("pixel_size", vec![1.0, 1.0])
            .with("sensor_thickness", 0.3)
    }

    fn build(sections: Vec<Configuration>) -> DetectorModel {
        DetectorModel::new("test", ConfigReader::from_sections(sections)).expect("valid model")
    }

    #[test]
    fn bare_sensor_envelope_matches_sensor() {
        let model = build(vec![header()]);
        assert_eq!(model.size(), model.sensor_size());
        assert_eq!(model.geometrical_center(), model.sensor_center());
    }

    #[test]
    fn planar_size_mirrors_the_larger_side() {
        let model = build(vec![
            header()
                .with("sensor_excess_left", 1.0)
                .with("sensor_excess_right", 5.0),
        ]);
        let size = model.size();
        let grid = model.grid_size();
        assert!((model.sensor_size().x() - (grid.x() + 6.0)).abs() < 1e-12);
        assert!((size.x() - (grid.x() + 10.0)).abs() < 1e-12);
        assert!((size.y() - grid.y()).abs() < 1e-12);

        let geometric = model.geometrical_center();
        assert!((geometric.x() - (model.center().x() + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_grid_reduces_to_mirrored_excess() {
        let model = build(vec![
            Configuration::global()
                .with("number_of_pixels", vec![0, 0])
                .with("pixel_size", vec![1.0, 1.0])
                .with("sensor_thickness", 0.3)
                .with("sensor_excess_left", 1.0)
                .with("sensor_excess_right", 5.0),
        ]);
        assert!((model.size().x() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn depth_is_not_mirrored() {
        let model = build(vec![
            header().with("chip_thickness", 0.1),
            Configuration::new("support")
                .with("thickness", 2.0)
                .with("size", vec![4.0, 4.0])
                .with("location", "chip"),
        ]);
        let size = model.size();
        assert!((size.z() - (0.15 + 0.1 + 2.0 + 0.15)).abs() < 1e-12);
        assert!((model.geometrical_center().z() - (2.25 - 1.2)).abs() < 1e-12);
    }

    #[test]
    fn oversized_supports_widen_the_envelope() {
        let model = build(vec![
            header(),
            Configuration::new("support")
                .with("thickness", 1.0)
                .with("size", vec![10.0, 6.0])
                .with("location", "sensor")
                .with("offset", vec![1.0, 0.0]),
        ]);
        let size = model.size();
        assert!((size.x() - 12.0).abs() < 1e-12);
        assert!((size.y() - 6.0).abs() < 1e-12);
        assert!((size.z() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn absolute_supports_far_away_are_enclosed() {
        let model = build(vec![
            header(),
            Configuration::new("support")
                .with("thickness", 1.0)
                .with("size", vec![1.0, 1.0])
                .with("location", "absolute")
                .with("offset", vec![0.0, 0.0, -10.0]),
        ]);
        assert!((model.size().z() - (10.5 + 0.15)).abs() < 1e-12);
    }

    #[test]
    fn hybrid_bump_layer_is_part_of_the_envelope() {
        let model = build(vec![
            header()
                .with("type", "hybrid")
                .with("chip_thickness", 0.2)
                .with("bump_cylinder_radius", 0.01)
                .with("bump_height", 0.05),
        ]);
        assert!((model.size().z() - (0.3 + 0.05 + 0.2)).abs() < 1e-12);
    }
}
