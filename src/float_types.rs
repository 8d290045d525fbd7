// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

/// Vertices closer than this to a plane are treated as lying on it when the
/// caller has no [`Options`](crate::options::Options) at hand. The compile
/// pipeline always uses `Options::on_epsilon` instead.
pub const ON_EPSILON: Real = 0.0001;

/// Two plane normals are the same when every component differs by less than this.
pub const NORMAL_EPSILON: Real = 0.000001;

/// Two plane distances are the same when they differ by less than this.
pub const DIST_EPSILON: Real = 0.0001;

/// Component-wise tolerance for point equality.
pub const EQUAL_EPSILON: Real = 0.0001;

/// Welding tolerance for output vertices.
pub const POINT_EPSILON: Real = 0.0001;

/// Collinearity tolerance used by the face merger.
pub const CONTINUOUS_EPSILON: Real = 0.0005;

/// Windings below this area are degenerate and get dropped.
pub const MIN_WINDING_AREA: Real = 0.0001;

/// Cross products shorter than this do not define a direction.
pub const ANGLE_EPSILON: Real = 0.000001;

/// Padding added around a model's bounds for the head node volume, so that
/// no leaf on the outer boundary ends up with zero volume.
pub const SIDESPACE: Real = 24.0;

/// Maximum number of points a face winding may carry before it is an error.
pub const MAX_EDGES: usize = 64;

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// World coordinate range
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
pub const MAX_WORLD_COORD: Real = 128.0 * 1024.0;
pub const MIN_WORLD_COORD: Real = -128.0 * 1024.0;
pub const WORLD_SIZE: Real = MAX_WORLD_COORD - MIN_WORLD_COORD;
