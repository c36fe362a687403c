pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维向量，用于像素间距、注入区偏移、开孔尺寸等平面量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        pub const ZERO: Self = Self(DVec2::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        /// 以给定 z 分量扩展为三维向量。
        #[inline]
        pub fn extend(self, z: f64) -> Vector3 {
            Vector3(self.0.extend(z))
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点，所有中心位置均以该类型返回。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Self = Self(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，表示尺寸与位移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const ZERO: Self = Self(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn half(self) -> Self {
            Self(self.0 * 0.5)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维轴对齐边界框，由中心与尺寸描述的盒体逐个并入。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds3D {
        min: Point3,
        max: Point3,
    }

    impl Bounds3D {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point3(DVec3::splat(f64::INFINITY)),
                max: Point3(DVec3::splat(f64::NEG_INFINITY)),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x()
                || self.min.y() > self.max.y()
                || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Point3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point3 {
            self.max
        }

        pub fn include_point(&mut self, point: Point3) {
            self.min = Point3(self.min.as_vec3().min(point.as_vec3()));
            self.max = Point3(self.max.as_vec3().max(point.as_vec3()));
        }

        /// 并入以 `center` 为中心、尺寸为 `size` 的盒体。
        pub fn include_box(&mut self, center: Point3, size: Vector3) {
            let half = size.half().as_vec3();
            self.include_point(Point3(center.as_vec3() - half));
            self.include_point(Point3(center.as_vec3() + half));
        }

        #[inline]
        pub fn center(&self) -> Point3 {
            debug_assert!(!self.is_empty());
            Point3((self.min.as_vec3() + self.max.as_vec3()) * 0.5)
        }

        #[inline]
        pub fn size(&self) -> Vector3 {
            debug_assert!(!self.is_empty());
            Vector3(self.max.as_vec3() - self.min.as_vec3())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn point_translation_and_difference() {
            let origin = Point3::new(1.0, 2.0, 3.0);
            let moved = origin.translate(Vector3::new(0.5, -2.0, 1.0));
            assert_eq!(moved, Point3::new(1.5, 0.0, 4.0));
            assert_eq!(origin.vector_to(moved), Vector3::new(0.5, -2.0, 1.0));
        }

        #[test]
        fn bounds_grow_with_boxes() {
            let mut bounds = Bounds3D::empty();
            assert!(bounds.is_empty());

            bounds.include_box(Point3::ORIGIN, Vector3::new(2.0, 2.0, 0.3));
            bounds.include_box(Point3::new(0.0, 0.0, -1.0), Vector3::new(1.0, 4.0, 1.0));
            assert!(!bounds.is_empty());
            assert_eq!(bounds.min(), Point3::new(-1.0, -2.0, -1.5));
            assert_eq!(bounds.max(), Point3::new(1.0, 2.0, 0.15));
            let size = bounds.size();
            assert_eq!((size.x(), size.y()), (2.0, 4.0));
            assert!((size.z() - 1.65).abs() < 1e-12);
            assert!((bounds.center().z() - (-0.675)).abs() < 1e-12);
        }

        #[test]
        fn flat_vector_extends_into_space() {
            let v = Vector2::new(0.03, 0.04).extend(0.0);
            assert_eq!(v, Vector3::new(0.03, 0.04, 0.0));
        }
    }
}

pub mod model;

pub use model::{
    BumpBonds, DetectorModel, ModelError, ModelKind, SupportLayer, SupportLocation,
};
