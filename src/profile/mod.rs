mod repo;
mod snapshot;

pub use repo::{PgProfileStore, ProfileStore};
pub use snapshot::{
    ActivityLevel, ChangeSpeed, Goal, MealType, Sex, UserProfileSnapshot, Weekday,
};
