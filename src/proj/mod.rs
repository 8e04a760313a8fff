pub mod crs;
pub mod datum;

use crate::error::ProjError;

/// Direction of a coordinate transform relative to the CRS pair it was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Source CRS -> destination CRS.
    Forward,
    /// Destination CRS -> source CRS.
    Inverse,
}

/// Point transform between two reference systems.
///
/// Implementations must return `Err` for points they cannot map (outside the
/// projection domain, non-finite results) rather than a garbage coordinate,
/// so callers can mark those points invalid.
pub trait CoordinateTransform {
    fn transform(&self, x: f64, y: f64, direction: Direction) -> Result<(f64, f64), ProjError>;

    fn forward(&self, x: f64, y: f64) -> Result<(f64, f64), ProjError> {
        self.transform(x, y, Direction::Forward)
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), ProjError> {
        self.transform(x, y, Direction::Inverse)
    }

    /// Batch transform in place. Stops at the first failing point.
    fn transform_batch(
        &self,
        coords: &mut [(f64, f64)],
        direction: Direction,
    ) -> Result<(), ProjError> {
        for c in coords.iter_mut() {
            *c = self.transform(c.0, c.1, direction)?;
        }
        Ok(())
    }
}

impl<T: CoordinateTransform + ?Sized> CoordinateTransform for Box<T> {
    fn transform(&self, x: f64, y: f64, direction: Direction) -> Result<(f64, f64), ProjError> {
        (**self).transform(x, y, direction)
    }
}

/// Synthetic transforms with closed-form inverses for deterministic tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::proj::crs::{ReferenceSystem, TransformFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// `X = sx * x + dx`, `Y = sy * y + dy`.
    #[derive(Clone, Copy, Debug)]
    pub struct ScaleShift {
        pub sx: f64,
        pub sy: f64,
        pub dx: f64,
        pub dy: f64,
    }

    impl CoordinateTransform for ScaleShift {
        fn transform(
            &self,
            x: f64,
            y: f64,
            direction: Direction,
        ) -> Result<(f64, f64), ProjError> {
            Ok(match direction {
                Direction::Forward => (self.sx * x + self.dx, self.sy * y + self.dy),
                Direction::Inverse => ((x - self.dx) / self.sx, (y - self.dy) / self.sy),
            })
        }
    }

    /// Bends rows into parabolas: `X = x`, `Y = y + k * x^2`.
    #[derive(Clone, Copy, Debug)]
    pub struct Parabolic {
        pub k: f64,
    }

    impl CoordinateTransform for Parabolic {
        fn transform(
            &self,
            x: f64,
            y: f64,
            direction: Direction,
        ) -> Result<(f64, f64), ProjError> {
            Ok(match direction {
                Direction::Forward => (x, y + self.k * x * x),
                Direction::Inverse => (x, y - self.k * x * x),
            })
        }
    }

    /// Identity that refuses destination points with `x > limit`.
    #[derive(Clone, Copy, Debug)]
    pub struct HalfPlane {
        pub limit: f64,
    }

    impl CoordinateTransform for HalfPlane {
        fn transform(
            &self,
            x: f64,
            y: f64,
            direction: Direction,
        ) -> Result<(f64, f64), ProjError> {
            if direction == Direction::Inverse && x > self.limit {
                return Err(ProjError::TransformFailed(format!(
                    "x={x} outside domain"
                )));
            }
            Ok((x, y))
        }
    }

    /// Wildly oscillating transform that never meets any tolerance.
    #[derive(Clone, Copy, Debug)]
    pub struct Chaotic;

    impl CoordinateTransform for Chaotic {
        fn transform(
            &self,
            x: f64,
            y: f64,
            direction: Direction,
        ) -> Result<(f64, f64), ProjError> {
            let wobble = (x * 7919.0).sin() * (y * 104729.0).cos() * 1.0e3;
            Ok(match direction {
                Direction::Forward => (x + wobble, y - wobble),
                Direction::Inverse => (x - wobble, y + wobble),
            })
        }
    }

    /// Hands out copies of one transform and counts how often it was asked.
    pub struct FixedFactory<T> {
        pub transform: T,
        pub calls: AtomicUsize,
    }

    impl<T> FixedFactory<T> {
        pub fn new(transform: T) -> Self {
            Self {
                transform,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<T: CoordinateTransform + Clone + Send + Sync + 'static> TransformFactory for FixedFactory<T> {
        fn create(
            &self,
            _src: &ReferenceSystem,
            _dst: &ReferenceSystem,
            _src_datum_transform: i32,
            _dst_datum_transform: i32,
        ) -> Result<Box<dyn CoordinateTransform>, ProjError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(self.transform.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_forward_inverse_dispatch() {
        let t = ScaleShift {
            sx: 2.0,
            sy: 0.5,
            dx: 10.0,
            dy: -4.0,
        };
        let (x, y) = t.forward(3.0, 8.0).unwrap();
        assert_relative_eq!(x, 16.0);
        assert_relative_eq!(y, 0.0);
        let (x2, y2) = t.inverse(x, y).unwrap();
        assert_relative_eq!(x2, 3.0);
        assert_relative_eq!(y2, 8.0);
    }

    #[test]
    fn test_batch_stops_on_failure() {
        let t = HalfPlane { limit: 5.0 };
        let mut ok = vec![(1.0, 1.0), (4.0, 2.0)];
        t.transform_batch(&mut ok, Direction::Inverse).unwrap();

        let mut bad = vec![(1.0, 1.0), (6.0, 2.0)];
        assert!(t.transform_batch(&mut bad, Direction::Inverse).is_err());
        // forward direction is unrestricted
        assert!(t.transform_batch(&mut bad, Direction::Forward).is_ok());
    }

    #[test]
    fn test_boxed_transform_delegates() {
        let boxed: Box<dyn CoordinateTransform> = Box::new(Parabolic { k: 1.0 });
        let (x, y) = boxed.forward(2.0, 1.0).unwrap();
        assert_relative_eq!(x, 2.0);
        assert_relative_eq!(y, 5.0);
    }
}
