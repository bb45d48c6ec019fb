//! Geometry: shapes, bounding boxes, distance, manifolds and time of impact.

pub mod aabb;
pub mod collide;
pub mod distance;
pub mod manifold;
pub mod shapes;
pub mod time_of_impact;

pub use aabb::{Aabb, RayCastInput, RayCastOutput};
pub use collide::{collide, contact_order};
pub use distance::{
    compute_distance, test_overlap, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache,
};
pub use manifold::{
    get_point_states, ContactFeature, FeatureType, Manifold, ManifoldPoint, ManifoldType,
    PointState, WorldManifold,
};
pub use shapes::{ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape, ShapeType};
pub use time_of_impact::{time_of_impact, ToiInput, ToiOutput, ToiState};
