//! # MaaDesk Core
//!
//! Typed config store, entity registry, and on-disk schema migration.
//!
//! ## Architecture
//! ```text
//! AppContext (one per process)
//!   ├── GlobalConfig            config/config.json
//!   ├── Registry
//!   │     ├── members           config/MaaConfig/* + config/GeneralConfig/*
//!   │     │     └── users       .../UserData/* | .../SubData/*
//!   │     ├── queues            config/QueueConfig/*.json
//!   │     └── plans             config/MaaPlanConfig/*
//!   ├── StageTable              rebuilt hourly from the metadata feed
//!   └── broadcast<AppEvent>     data-changed notifications
//!
//! migrate::check_data           data/data.db version marker, v1.4 → v1.7
//! ```

pub mod context;
pub mod documents;
pub mod error;
pub mod item;
pub mod migrate;
pub mod platform;
pub mod registry;
pub mod stage;

pub use context::{AppContext, AppEvent, default_data_dir, server_date};
pub use documents::{
    GeneralConfig, GeneralSubConfig, GlobalConfig, MaaConfig, MaaPlanConfig, MaaUserConfig,
    PlanValues, QueueConfig,
};
pub use error::{MaadeskError, Result};
pub use item::{Document, ItemId, ItemSpec, Validator};
pub use platform::{
    AutoConfirm, NullPlatform, OfflineFetcher, PlatformOps, PowerAction, PowerConfirmer,
    StageFetcher, TaskLauncher, UpdateChecker, WindowInfo,
};
pub use registry::{
    Member, MemberConfig, MemberKind, PlanEntry, QueueEntry, Registry, UserConfig, UserEntry,
    UserRunUpdate,
};
pub use stage::{StageActivity, StageOption, StageTable};
