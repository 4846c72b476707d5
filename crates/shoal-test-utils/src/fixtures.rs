//! Shared space and value fixtures.

use shoal_space::{SpaceDesc, Value};

/// The [`GridWorld`](crate::GridWorld) observation space:
/// `{"pos": Box[2], "inv": {"gold": Box[1]}}`, flat length 3.
pub fn grid_obs_space() -> SpaceDesc {
    SpaceDesc::dict([
        ("pos", SpaceDesc::boxed([2usize])),
        (
            "inv",
            SpaceDesc::dict([("gold", SpaceDesc::boxed([1usize]))]),
        ),
    ])
}

/// A value conforming to [`grid_obs_space`].
pub fn grid_obs_value(x: f32, y: f32, gold: f32) -> Value {
    Value::dict([
        ("pos", Value::array([x, y])),
        ("inv", Value::dict([("gold", Value::scalar(gold))])),
    ])
}
