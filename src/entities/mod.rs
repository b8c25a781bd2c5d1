//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod access_right;
pub mod availability_lock;
pub mod contract;
pub mod delegation_user;
pub mod group;
pub mod group_user;
pub mod holiday;
pub mod inventory_pool;
pub mod item;
pub mod model;
pub mod partition;
pub mod reservation;
pub mod user;

// Re-export specific types to avoid conflicts
pub use access_right::{Entity as AccessRight, Model as AccessRightModel, Role};
pub use availability_lock::Entity as AvailabilityLock;
pub use contract::{Column as ContractColumn, Entity as Contract, Model as ContractModel};
pub use delegation_user::Entity as DelegationUser;
pub use group::{Entity as Group, Model as GroupModel};
pub use group_user::Entity as GroupUser;
pub use holiday::{Entity as Holiday, Model as HolidayModel};
pub use inventory_pool::{Entity as InventoryPool, Model as InventoryPoolModel};
pub use item::{Entity as Item, Model as ItemModel};
pub use model::Entity as LendableModel;
pub use partition::{Entity as Partition, Model as PartitionModel};
pub use reservation::{
    Column as ReservationColumn, Entity as Reservation, Model as ReservationModel,
    ReservationStatus,
};
pub use user::{Entity as User, Model as UserModel};
