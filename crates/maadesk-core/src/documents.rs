//! Fixed document schemas.
//!
//! Every document type wraps a [`Document`] and declares its item set in
//! an explicit registration list — the schema is a compile-time constant,
//! not something discovered at runtime. Const [`ItemId`] handles give
//! typed access to individual items.

use chrono::Weekday;
use serde_json::Value;

use crate::item::{Document, ItemId, ItemSpec, Validator};

/// Placeholder value for an unassigned queue member slot.
pub const MEMBER_DISABLED: &str = "Disabled";
/// Stage-mode value meaning "use the fixed per-user stage fields".
pub const STAGE_MODE_FIXED: &str = "Fixed";
/// Sentinel timestamp meaning "never launched".
pub const NEVER_LAUNCHED: &str = "2000-01-01 00:00:00";

/// Plan-table groups: the "ALL" fallback plus one per weekday.
pub const STAGE_GROUPS: [&str; 8] = [
    "ALL",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Fields repeated in every plan-table group.
pub const PLAN_FIELDS: [&str; 7] = [
    "MedicineNumb",
    "SeriesNumb",
    "Stage",
    "Stage_1",
    "Stage_2",
    "Stage_3",
    "Stage_Remain",
];

const SERIES_OPTIONS: [&str; 8] = ["0", "6", "5", "4", "3", "2", "1", "-1"];

pub fn weekday_group(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn spec(id: ItemId, default: impl Into<Value>) -> ItemSpec {
    ItemSpec::new(id, default)
}

fn bool_spec(id: ItemId, default: bool) -> ItemSpec {
    ItemSpec::with(id, default, Validator::Bool)
}

fn range_spec(id: ItemId, default: i64, min: i64, max: i64) -> ItemSpec {
    ItemSpec::with(id, default, Validator::Range { min, max })
}

fn options_spec(id: ItemId, default: &str, options: &[&str]) -> ItemSpec {
    ItemSpec::with(
        id,
        default,
        Validator::Options(options.iter().map(|o| Value::from(*o)).collect()),
    )
}

fn options_int_spec(id: ItemId, default: i64, options: &[i64]) -> ItemSpec {
    ItemSpec::with(
        id,
        default,
        Validator::Options(options.iter().map(|o| Value::from(*o)).collect()),
    )
}

macro_rules! config_document {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(Document);

        impl $name {
            pub fn new() -> Self {
                Self(Document::new(Self::items()))
            }

            /// Load from `path`, best effort: missing or corrupt files
            /// leave the defaults in place.
            pub fn load_from(path: impl Into<std::path::PathBuf>) -> Self {
                let mut config = Self::new();
                config.0.load(path);
                config
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = Document;
            fn deref(&self) -> &Document {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Document {
                &mut self.0
            }
        }
    };
}

config_document! {
    /// Process-wide settings: behavior, startup, UI, notification, update.
    GlobalConfig
}

impl GlobalConfig {
    pub const HOME_IMAGE_MODE: ItemId = ItemId::new("Function", "HomeImageMode");
    pub const HISTORY_RETENTION: ItemId = ItemId::new("Function", "HistoryRetentionTime");
    pub const IF_ALLOW_SLEEP: ItemId = ItemId::new("Function", "IfAllowSleep");
    pub const IF_SILENCE: ItemId = ItemId::new("Function", "IfSilence");
    pub const BOSS_KEY: ItemId = ItemId::new("Function", "BossKey");
    pub const UNATTENDED_MODE: ItemId = ItemId::new("Function", "UnattendedMode");
    pub const IF_AGREE_BILIBILI: ItemId = ItemId::new("Function", "IfAgreeBilibili");
    pub const IF_SKIP_SPLASH_ADS: ItemId = ItemId::new("Function", "IfSkipMumuSplashAds");

    pub const VOICE_ENABLED: ItemId = ItemId::new("Voice", "Enabled");
    pub const VOICE_TYPE: ItemId = ItemId::new("Voice", "Type");

    pub const IF_SELF_START: ItemId = ItemId::new("Start", "IfSelfStart");
    pub const IF_RUN_DIRECTLY: ItemId = ItemId::new("Start", "IfRunDirectly");
    pub const IF_MINIMIZE_DIRECTLY: ItemId = ItemId::new("Start", "IfMinimizeDirectly");

    pub const IF_SHOW_TRAY: ItemId = ItemId::new("UI", "IfShowTray");
    pub const IF_TO_TRAY: ItemId = ItemId::new("UI", "IfToTray");
    pub const UI_SIZE: ItemId = ItemId::new("UI", "size");
    pub const UI_LOCATION: ItemId = ItemId::new("UI", "location");
    pub const UI_MAXIMIZED: ItemId = ItemId::new("UI", "maximized");

    pub const SEND_RESULT_TIME: ItemId = ItemId::new("Notify", "SendTaskResultTime");
    pub const IF_SEND_STATISTIC: ItemId = ItemId::new("Notify", "IfSendStatistic");
    pub const IF_SEND_SIX_STAR: ItemId = ItemId::new("Notify", "IfSendSixStar");
    pub const IF_PUSH_PLYER: ItemId = ItemId::new("Notify", "IfPushPlyer");
    pub const IF_SEND_MAIL: ItemId = ItemId::new("Notify", "IfSendMail");
    pub const SMTP_SERVER: ItemId = ItemId::new("Notify", "SMTPServerAddress");
    pub const AUTH_CODE: ItemId = ItemId::new("Notify", "AuthorizationCode");
    pub const FROM_ADDRESS: ItemId = ItemId::new("Notify", "FromAddress");
    pub const TO_ADDRESS: ItemId = ItemId::new("Notify", "ToAddress");
    pub const IF_SERVER_CHAN: ItemId = ItemId::new("Notify", "IfServerChan");
    pub const SERVER_CHAN_KEY: ItemId = ItemId::new("Notify", "ServerChanKey");
    pub const SERVER_CHAN_CHANNEL: ItemId = ItemId::new("Notify", "ServerChanChannel");
    pub const SERVER_CHAN_TAG: ItemId = ItemId::new("Notify", "ServerChanTag");
    pub const IF_CORP_WEBHOOK: ItemId = ItemId::new("Notify", "IfCompanyWebHookBot");
    pub const CORP_WEBHOOK_URL: ItemId = ItemId::new("Notify", "CompanyWebHookBotUrl");

    pub const IF_AUTO_UPDATE: ItemId = ItemId::new("Update", "IfAutoUpdate");
    pub const UPDATE_TYPE: ItemId = ItemId::new("Update", "UpdateType");
    pub const THREAD_NUMB: ItemId = ItemId::new("Update", "ThreadNumb");
    pub const PROXY_ADDRESS: ItemId = ItemId::new("Update", "ProxyAddress");
    pub const PROXY_URL_LIST: ItemId = ItemId::new("Update", "ProxyUrlList");
    pub const MIRROR_CDK: ItemId = ItemId::new("Update", "MirrorChyanCDK");

    fn items() -> Vec<ItemSpec> {
        vec![
            options_spec(Self::HOME_IMAGE_MODE, "Default", &["Default", "Custom", "Theme"]),
            options_int_spec(Self::HISTORY_RETENTION, 0, &[7, 15, 30, 60, 90, 180, 365, 0]),
            bool_spec(Self::IF_ALLOW_SLEEP, false),
            bool_spec(Self::IF_SILENCE, false),
            spec(Self::BOSS_KEY, ""),
            bool_spec(Self::UNATTENDED_MODE, false),
            bool_spec(Self::IF_AGREE_BILIBILI, false),
            bool_spec(Self::IF_SKIP_SPLASH_ADS, false),
            bool_spec(Self::VOICE_ENABLED, false),
            options_spec(Self::VOICE_TYPE, "simple", &["simple", "noisy"]),
            bool_spec(Self::IF_SELF_START, false),
            bool_spec(Self::IF_RUN_DIRECTLY, false),
            bool_spec(Self::IF_MINIMIZE_DIRECTLY, false),
            bool_spec(Self::IF_SHOW_TRAY, false),
            bool_spec(Self::IF_TO_TRAY, false),
            spec(Self::UI_SIZE, "1200x700"),
            spec(Self::UI_LOCATION, "100x100"),
            bool_spec(Self::UI_MAXIMIZED, false),
            options_spec(Self::SEND_RESULT_TIME, "Never", &["Never", "Always", "OnFailure"]),
            bool_spec(Self::IF_SEND_STATISTIC, false),
            bool_spec(Self::IF_SEND_SIX_STAR, false),
            bool_spec(Self::IF_PUSH_PLYER, false),
            bool_spec(Self::IF_SEND_MAIL, false),
            spec(Self::SMTP_SERVER, ""),
            spec(Self::AUTH_CODE, ""),
            spec(Self::FROM_ADDRESS, ""),
            spec(Self::TO_ADDRESS, ""),
            bool_spec(Self::IF_SERVER_CHAN, false),
            spec(Self::SERVER_CHAN_KEY, ""),
            spec(Self::SERVER_CHAN_CHANNEL, ""),
            spec(Self::SERVER_CHAN_TAG, ""),
            bool_spec(Self::IF_CORP_WEBHOOK, false),
            spec(Self::CORP_WEBHOOK_URL, ""),
            bool_spec(Self::IF_AUTO_UPDATE, false),
            options_spec(Self::UPDATE_TYPE, "stable", &["stable", "beta"]),
            range_spec(Self::THREAD_NUMB, 8, 1, 32),
            spec(Self::PROXY_ADDRESS, ""),
            ItemSpec::with(Self::PROXY_URL_LIST, Value::Array(vec![]), Validator::UrlList),
            spec(Self::MIRROR_CDK, ""),
        ]
    }
}

config_document! {
    /// One dispatch queue: enablement, time slots, member slots, last-run data.
    QueueConfig
}

impl QueueConfig {
    pub const NAME: ItemId = ItemId::new("QueueSet", "Name");
    pub const ENABLED: ItemId = ItemId::new("QueueSet", "Enabled");
    pub const AFTER_ACCOMPLISH: ItemId = ItemId::new("QueueSet", "AfterAccomplish");

    pub const TIME_ENABLED: [ItemId; 10] = [
        ItemId::new("Time", "TimeEnabled_0"),
        ItemId::new("Time", "TimeEnabled_1"),
        ItemId::new("Time", "TimeEnabled_2"),
        ItemId::new("Time", "TimeEnabled_3"),
        ItemId::new("Time", "TimeEnabled_4"),
        ItemId::new("Time", "TimeEnabled_5"),
        ItemId::new("Time", "TimeEnabled_6"),
        ItemId::new("Time", "TimeEnabled_7"),
        ItemId::new("Time", "TimeEnabled_8"),
        ItemId::new("Time", "TimeEnabled_9"),
    ];
    pub const TIME_SET: [ItemId; 10] = [
        ItemId::new("Time", "TimeSet_0"),
        ItemId::new("Time", "TimeSet_1"),
        ItemId::new("Time", "TimeSet_2"),
        ItemId::new("Time", "TimeSet_3"),
        ItemId::new("Time", "TimeSet_4"),
        ItemId::new("Time", "TimeSet_5"),
        ItemId::new("Time", "TimeSet_6"),
        ItemId::new("Time", "TimeSet_7"),
        ItemId::new("Time", "TimeSet_8"),
        ItemId::new("Time", "TimeSet_9"),
    ];
    pub const MEMBERS: [ItemId; 10] = [
        ItemId::new("Queue", "Member_1"),
        ItemId::new("Queue", "Member_2"),
        ItemId::new("Queue", "Member_3"),
        ItemId::new("Queue", "Member_4"),
        ItemId::new("Queue", "Member_5"),
        ItemId::new("Queue", "Member_6"),
        ItemId::new("Queue", "Member_7"),
        ItemId::new("Queue", "Member_8"),
        ItemId::new("Queue", "Member_9"),
        ItemId::new("Queue", "Member_10"),
    ];

    pub const LAST_PROXY_TIME: ItemId = ItemId::new("Data", "LastProxyTime");
    pub const LAST_PROXY_HISTORY: ItemId = ItemId::new("Data", "LastProxyHistory");

    fn items() -> Vec<ItemSpec> {
        let mut items = vec![
            spec(Self::NAME, ""),
            bool_spec(Self::ENABLED, false),
            options_spec(
                Self::AFTER_ACCOMPLISH,
                "NoAction",
                &["NoAction", "KillSelf", "Sleep", "Hibernate", "Shutdown"],
            ),
        ];
        for slot in 0..10 {
            items.push(bool_spec(Self::TIME_ENABLED[slot], false));
            items.push(spec(Self::TIME_SET[slot], "00:00"));
        }
        for member in Self::MEMBERS {
            items.push(spec(member, MEMBER_DISABLED));
        }
        items.push(spec(Self::LAST_PROXY_TIME, NEVER_LAUNCHED));
        items.push(spec(Self::LAST_PROXY_HISTORY, "No run history"));
        items
    }

    /// Enabled "HH:MM" slot values.
    pub fn enabled_slots(&self) -> Vec<String> {
        (0..10)
            .filter(|&slot| self.get_bool(Self::TIME_ENABLED[slot]))
            .map(|slot| self.get_str(Self::TIME_SET[slot]))
            .collect()
    }
}

config_document! {
    /// Per-member run parameters for a scripted-account member.
    MaaConfig
}

impl MaaConfig {
    pub const NAME: ItemId = ItemId::new("MaaSet", "Name");
    pub const PATH: ItemId = ItemId::new("MaaSet", "Path");

    pub const TASK_TRANSITION: ItemId = ItemId::new("RunSet", "TaskTransitionMethod");
    pub const PROXY_TIMES_LIMIT: ItemId = ItemId::new("RunSet", "ProxyTimesLimit");
    pub const ADB_SEARCH_RANGE: ItemId = ItemId::new("RunSet", "ADBSearchRange");
    pub const RUN_TIMES_LIMIT: ItemId = ItemId::new("RunSet", "RunTimesLimit");
    pub const ANNIHILATION_TIME_LIMIT: ItemId = ItemId::new("RunSet", "AnnihilationTimeLimit");
    pub const ROUTINE_TIME_LIMIT: ItemId = ItemId::new("RunSet", "RoutineTimeLimit");
    pub const ANNIHILATION_WEEKLY_LIMIT: ItemId = ItemId::new("RunSet", "AnnihilationWeeklyLimit");
    pub const AUTO_UPDATE: ItemId = ItemId::new("RunSet", "AutoUpdateMaa");

    fn items() -> Vec<ItemSpec> {
        vec![
            spec(Self::NAME, ""),
            ItemSpec::with(Self::PATH, ".", Validator::Folder),
            options_spec(
                Self::TASK_TRANSITION,
                "ExitEmulator",
                &["NoAction", "ExitGame", "ExitEmulator"],
            ),
            range_spec(Self::PROXY_TIMES_LIMIT, 0, 0, 1024),
            range_spec(Self::ADB_SEARCH_RANGE, 0, 0, 3),
            range_spec(Self::RUN_TIMES_LIMIT, 3, 1, 1024),
            range_spec(Self::ANNIHILATION_TIME_LIMIT, 40, 1, 1024),
            range_spec(Self::ROUTINE_TIME_LIMIT, 10, 1, 1024),
            bool_spec(Self::ANNIHILATION_WEEKLY_LIMIT, false),
            bool_spec(Self::AUTO_UPDATE, false),
        ]
    }

    pub fn name(&self) -> String {
        self.get_str(Self::NAME)
    }
}

/// Effective stage/medicine/series values after plan resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanValues {
    pub medicine_numb: i64,
    pub series_numb: String,
    pub stage: String,
    pub stage_1: String,
    pub stage_2: String,
    pub stage_3: String,
    pub stage_remain: String,
}

config_document! {
    /// One managed account under a scripted-account member.
    MaaUserConfig
}

impl MaaUserConfig {
    pub const NAME: ItemId = ItemId::new("Info", "Name");
    pub const ID: ItemId = ItemId::new("Info", "Id");
    pub const MODE: ItemId = ItemId::new("Info", "Mode");
    pub const STAGE_MODE: ItemId = ItemId::new("Info", "StageMode");
    pub const SERVER: ItemId = ItemId::new("Info", "Server");
    pub const STATUS: ItemId = ItemId::new("Info", "Status");
    pub const REMAINED_DAY: ItemId = ItemId::new("Info", "RemainedDay");
    pub const ANNIHILATION: ItemId = ItemId::new("Info", "Annihilation");
    pub const ROUTINE: ItemId = ItemId::new("Info", "Routine");
    pub const INFRAST_MODE: ItemId = ItemId::new("Info", "InfrastMode");
    pub const PASSWORD: ItemId = ItemId::new("Info", "Password");
    pub const NOTES: ItemId = ItemId::new("Info", "Notes");
    pub const MEDICINE_NUMB: ItemId = ItemId::new("Info", "MedicineNumb");
    pub const SERIES_NUMB: ItemId = ItemId::new("Info", "SeriesNumb");
    pub const STAGE: ItemId = ItemId::new("Info", "Stage");
    pub const STAGE_1: ItemId = ItemId::new("Info", "Stage_1");
    pub const STAGE_2: ItemId = ItemId::new("Info", "Stage_2");
    pub const STAGE_3: ItemId = ItemId::new("Info", "Stage_3");
    pub const STAGE_REMAIN: ItemId = ItemId::new("Info", "Stage_Remain");
    pub const IF_SKLAND: ItemId = ItemId::new("Info", "IfSkland");
    pub const SKLAND_TOKEN: ItemId = ItemId::new("Info", "SklandToken");

    pub const LAST_PROXY_DATE: ItemId = ItemId::new("Data", "LastProxyDate");
    pub const LAST_ANNIHILATION_DATE: ItemId = ItemId::new("Data", "LastAnnihilationDate");
    pub const LAST_SKLAND_DATE: ItemId = ItemId::new("Data", "LastSklandDate");
    pub const PROXY_TIMES: ItemId = ItemId::new("Data", "ProxyTimes");
    pub const IF_PASS_CHECK: ItemId = ItemId::new("Data", "IfPassCheck");
    pub const CUSTOM_INFRAST_INDEX: ItemId = ItemId::new("Data", "CustomInfrastPlanIndex");

    pub const IF_WAKE_UP: ItemId = ItemId::new("Task", "IfWakeUp");
    pub const IF_RECRUITING: ItemId = ItemId::new("Task", "IfRecruiting");
    pub const IF_BASE: ItemId = ItemId::new("Task", "IfBase");
    pub const IF_COMBAT: ItemId = ItemId::new("Task", "IfCombat");
    pub const IF_MALL: ItemId = ItemId::new("Task", "IfMall");
    pub const IF_MISSION: ItemId = ItemId::new("Task", "IfMission");
    pub const IF_AUTO_ROGUELIKE: ItemId = ItemId::new("Task", "IfAutoRoguelike");
    pub const IF_RECLAMATION: ItemId = ItemId::new("Task", "IfReclamation");

    pub const NOTIFY_ENABLED: ItemId = ItemId::new("Notify", "Enabled");
    pub const NOTIFY_STATISTIC: ItemId = ItemId::new("Notify", "IfSendStatistic");
    pub const NOTIFY_SIX_STAR: ItemId = ItemId::new("Notify", "IfSendSixStar");
    pub const NOTIFY_MAIL: ItemId = ItemId::new("Notify", "IfSendMail");
    pub const NOTIFY_TO_ADDRESS: ItemId = ItemId::new("Notify", "ToAddress");
    pub const NOTIFY_SERVER_CHAN: ItemId = ItemId::new("Notify", "IfServerChan");
    pub const NOTIFY_SERVER_CHAN_KEY: ItemId = ItemId::new("Notify", "ServerChanKey");
    pub const NOTIFY_SERVER_CHAN_CHANNEL: ItemId = ItemId::new("Notify", "ServerChanChannel");
    pub const NOTIFY_SERVER_CHAN_TAG: ItemId = ItemId::new("Notify", "ServerChanTag");
    pub const NOTIFY_CORP_WEBHOOK: ItemId = ItemId::new("Notify", "IfCompanyWebHookBot");
    pub const NOTIFY_CORP_WEBHOOK_URL: ItemId = ItemId::new("Notify", "CompanyWebHookBotUrl");

    fn items() -> Vec<ItemSpec> {
        vec![
            spec(Self::NAME, "New User"),
            spec(Self::ID, ""),
            options_spec(Self::MODE, "simple", &["simple", "detailed"]),
            spec(Self::STAGE_MODE, STAGE_MODE_FIXED),
            options_spec(Self::SERVER, "Official", &["Official", "Bilibili"]),
            bool_spec(Self::STATUS, true),
            range_spec(Self::REMAINED_DAY, -1, -1, 1024),
            bool_spec(Self::ANNIHILATION, false),
            bool_spec(Self::ROUTINE, false),
            options_spec(Self::INFRAST_MODE, "Normal", &["Normal", "Rotation", "Custom"]),
            spec(Self::PASSWORD, ""),
            spec(Self::NOTES, "-"),
            range_spec(Self::MEDICINE_NUMB, 0, 0, 1024),
            options_spec(Self::SERIES_NUMB, "0", &SERIES_OPTIONS),
            spec(Self::STAGE, "-"),
            spec(Self::STAGE_1, "-"),
            spec(Self::STAGE_2, "-"),
            spec(Self::STAGE_3, "-"),
            spec(Self::STAGE_REMAIN, "-"),
            bool_spec(Self::IF_SKLAND, false),
            spec(Self::SKLAND_TOKEN, ""),
            spec(Self::LAST_PROXY_DATE, "2000-01-01"),
            spec(Self::LAST_ANNIHILATION_DATE, "2000-01-01"),
            spec(Self::LAST_SKLAND_DATE, "2000-01-01"),
            range_spec(Self::PROXY_TIMES, 0, 0, 1024),
            bool_spec(Self::IF_PASS_CHECK, true),
            spec(Self::CUSTOM_INFRAST_INDEX, "0"),
            bool_spec(Self::IF_WAKE_UP, true),
            bool_spec(Self::IF_RECRUITING, true),
            bool_spec(Self::IF_BASE, true),
            bool_spec(Self::IF_COMBAT, true),
            bool_spec(Self::IF_MALL, true),
            bool_spec(Self::IF_MISSION, true),
            bool_spec(Self::IF_AUTO_ROGUELIKE, false),
            bool_spec(Self::IF_RECLAMATION, false),
            bool_spec(Self::NOTIFY_ENABLED, false),
            bool_spec(Self::NOTIFY_STATISTIC, false),
            bool_spec(Self::NOTIFY_SIX_STAR, false),
            bool_spec(Self::NOTIFY_MAIL, false),
            spec(Self::NOTIFY_TO_ADDRESS, ""),
            bool_spec(Self::NOTIFY_SERVER_CHAN, false),
            spec(Self::NOTIFY_SERVER_CHAN_KEY, ""),
            spec(Self::NOTIFY_SERVER_CHAN_CHANNEL, ""),
            spec(Self::NOTIFY_SERVER_CHAN_TAG, ""),
            bool_spec(Self::NOTIFY_CORP_WEBHOOK, false),
            spec(Self::NOTIFY_CORP_WEBHOOK_URL, ""),
        ]
    }

    /// The referenced plan-table name, when stage mode is not fixed.
    pub fn plan_reference(&self) -> Option<String> {
        let mode = self.get_str(Self::STAGE_MODE);
        (mode != STAGE_MODE_FIXED).then_some(mode)
    }

    /// Effective run values: the user's own fixed fields, or today's row
    /// of the referenced plan-table when one is selected and resolvable.
    pub fn plan_info(&self, plan: Option<&MaaPlanConfig>, today: Weekday) -> PlanValues {
        match (self.plan_reference(), plan) {
            (Some(_), Some(plan)) => plan.current_values(today),
            _ => PlanValues {
                medicine_numb: self.get_int(Self::MEDICINE_NUMB),
                series_numb: self.get_str(Self::SERIES_NUMB),
                stage: self.get_str(Self::STAGE),
                stage_1: self.get_str(Self::STAGE_1),
                stage_2: self.get_str(Self::STAGE_2),
                stage_3: self.get_str(Self::STAGE_3),
                stage_remain: self.get_str(Self::STAGE_REMAIN),
            },
        }
    }
}

config_document! {
    /// A per-weekday (or single "ALL") table of stage selections.
    MaaPlanConfig
}

impl MaaPlanConfig {
    pub const NAME: ItemId = ItemId::new("Info", "Name");
    pub const MODE: ItemId = ItemId::new("Info", "Mode");

    fn items() -> Vec<ItemSpec> {
        let mut items = vec![
            spec(Self::NAME, ""),
            options_spec(Self::MODE, "ALL", &["ALL", "Weekly"]),
        ];
        for group in STAGE_GROUPS {
            for field in PLAN_FIELDS {
                let id = Self::item(group, field)
                    .unwrap_or_else(|| unreachable!("static plan tables"));
                items.push(match field {
                    "MedicineNumb" => range_spec(id, 0, 0, 1024),
                    "SeriesNumb" => options_spec(id, "0", &SERIES_OPTIONS),
                    _ => spec(id, "-"),
                });
            }
        }
        items
    }

    /// Item handle for one cell of the table; both names must come from
    /// the static group/field sets.
    pub fn item(group: &str, field: &str) -> Option<ItemId> {
        let group = STAGE_GROUPS.iter().find(|g| **g == group)?;
        let field = PLAN_FIELDS.iter().find(|f| **f == field)?;
        Some(ItemId::new(group, field))
    }

    /// The group the table resolves to today: "ALL" mode always uses the
    /// ALL row, "Weekly" uses the current weekday.
    pub fn current_group(&self, today: Weekday) -> &'static str {
        if self.get_str(Self::MODE) == "Weekly" {
            weekday_group(today)
        } else {
            "ALL"
        }
    }

    pub fn current_values(&self, today: Weekday) -> PlanValues {
        let group = self.current_group(today);
        let cell = |field: &str| {
            Self::item(group, field)
                .map(|id| self.get_str(id))
                .unwrap_or_default()
        };
        PlanValues {
            medicine_numb: Self::item(group, "MedicineNumb")
                .map(|id| self.get_int(id))
                .unwrap_or_default(),
            series_numb: cell("SeriesNumb"),
            stage: cell("Stage"),
            stage_1: cell("Stage_1"),
            stage_2: cell("Stage_2"),
            stage_3: cell("Stage_3"),
            stage_remain: cell("Stage_Remain"),
        }
    }

    pub fn name(&self) -> String {
        self.get_str(Self::NAME)
    }
}

config_document! {
    /// Run parameters for an arbitrary external-script member.
    GeneralConfig
}

impl GeneralConfig {
    pub const NAME: ItemId = ItemId::new("Script", "Name");
    pub const ROOT_PATH: ItemId = ItemId::new("Script", "RootPath");
    pub const SCRIPT_PATH: ItemId = ItemId::new("Script", "ScriptPath");
    pub const ARGUMENTS: ItemId = ItemId::new("Script", "Arguments");
    pub const IF_TRACK_PROCESS: ItemId = ItemId::new("Script", "IfTrackProcess");
    pub const CONFIG_PATH: ItemId = ItemId::new("Script", "ConfigPath");
    pub const CONFIG_PATH_MODE: ItemId = ItemId::new("Script", "ConfigPathMode");
    pub const LOG_PATH: ItemId = ItemId::new("Script", "LogPath");
    pub const LOG_PATH_FORMAT: ItemId = ItemId::new("Script", "LogPathFormat");
    pub const LOG_TIME_START: ItemId = ItemId::new("Script", "LogTimeStart");
    pub const LOG_TIME_END: ItemId = ItemId::new("Script", "LogTimeEnd");
    pub const LOG_TIME_FORMAT: ItemId = ItemId::new("Script", "LogTimeFormat");
    pub const SUCCESS_LOG: ItemId = ItemId::new("Script", "SuccessLog");
    pub const ERROR_LOG: ItemId = ItemId::new("Script", "ErrorLog");

    pub const GAME_ENABLED: ItemId = ItemId::new("Game", "Enabled");
    pub const GAME_STYLE: ItemId = ItemId::new("Game", "Style");
    pub const GAME_PATH: ItemId = ItemId::new("Game", "Path");
    pub const GAME_ARGUMENTS: ItemId = ItemId::new("Game", "Arguments");
    pub const GAME_WAIT_TIME: ItemId = ItemId::new("Game", "WaitTime");
    pub const GAME_FORCE_CLOSE: ItemId = ItemId::new("Game", "IfForceClose");

    pub const PROXY_TIMES_LIMIT: ItemId = ItemId::new("Run", "ProxyTimesLimit");
    pub const RUN_TIMES_LIMIT: ItemId = ItemId::new("Run", "RunTimesLimit");
    pub const RUN_TIME_LIMIT: ItemId = ItemId::new("Run", "RunTimeLimit");

    fn items() -> Vec<ItemSpec> {
        vec![
            spec(Self::NAME, ""),
            ItemSpec::with(Self::ROOT_PATH, ".", Validator::Folder),
            ItemSpec::with(Self::SCRIPT_PATH, ".", Validator::File),
            spec(Self::ARGUMENTS, ""),
            bool_spec(Self::IF_TRACK_PROCESS, false),
            ItemSpec::with(Self::CONFIG_PATH, ".", Validator::File),
            options_spec(Self::CONFIG_PATH_MODE, "File", &["File", "Folder"]),
            ItemSpec::with(Self::LOG_PATH, ".", Validator::File),
            spec(Self::LOG_PATH_FORMAT, "%Y-%m-%d"),
            range_spec(Self::LOG_TIME_START, 1, 1, 1024),
            range_spec(Self::LOG_TIME_END, 1, 1, 1024),
            spec(Self::LOG_TIME_FORMAT, "%Y-%m-%d %H:%M:%S"),
            spec(Self::SUCCESS_LOG, ""),
            spec(Self::ERROR_LOG, ""),
            bool_spec(Self::GAME_ENABLED, false),
            options_spec(Self::GAME_STYLE, "Emulator", &["Emulator", "Client"]),
            ItemSpec::with(Self::GAME_PATH, ".", Validator::File),
            spec(Self::GAME_ARGUMENTS, ""),
            range_spec(Self::GAME_WAIT_TIME, 0, 0, 1024),
            bool_spec(Self::GAME_FORCE_CLOSE, false),
            range_spec(Self::PROXY_TIMES_LIMIT, 0, 0, 1024),
            range_spec(Self::RUN_TIMES_LIMIT, 3, 1, 1024),
            range_spec(Self::RUN_TIME_LIMIT, 10, 1, 1024),
        ]
    }

    pub fn name(&self) -> String {
        self.get_str(Self::NAME)
    }
}

config_document! {
    /// One sub-configuration under an external-script member.
    GeneralSubConfig
}

impl GeneralSubConfig {
    pub const NAME: ItemId = ItemId::new("Info", "Name");
    pub const STATUS: ItemId = ItemId::new("Info", "Status");
    pub const REMAINED_DAY: ItemId = ItemId::new("Info", "RemainedDay");
    pub const IF_SCRIPT_BEFORE: ItemId = ItemId::new("Info", "IfScriptBeforeTask");
    pub const SCRIPT_BEFORE: ItemId = ItemId::new("Info", "ScriptBeforeTask");
    pub const IF_SCRIPT_AFTER: ItemId = ItemId::new("Info", "IfScriptAfterTask");
    pub const SCRIPT_AFTER: ItemId = ItemId::new("Info", "ScriptAfterTask");
    pub const NOTES: ItemId = ItemId::new("Info", "Notes");

    pub const LAST_PROXY_DATE: ItemId = ItemId::new("Data", "LastProxyDate");
    pub const PROXY_TIMES: ItemId = ItemId::new("Data", "ProxyTimes");

    pub const NOTIFY_ENABLED: ItemId = ItemId::new("Notify", "Enabled");
    pub const NOTIFY_STATISTIC: ItemId = ItemId::new("Notify", "IfSendStatistic");
    pub const NOTIFY_MAIL: ItemId = ItemId::new("Notify", "IfSendMail");
    pub const NOTIFY_TO_ADDRESS: ItemId = ItemId::new("Notify", "ToAddress");
    pub const NOTIFY_SERVER_CHAN: ItemId = ItemId::new("Notify", "IfServerChan");
    pub const NOTIFY_SERVER_CHAN_KEY: ItemId = ItemId::new("Notify", "ServerChanKey");
    pub const NOTIFY_SERVER_CHAN_CHANNEL: ItemId = ItemId::new("Notify", "ServerChanChannel");
    pub const NOTIFY_SERVER_CHAN_TAG: ItemId = ItemId::new("Notify", "ServerChanTag");
    pub const NOTIFY_CORP_WEBHOOK: ItemId = ItemId::new("Notify", "IfCompanyWebHookBot");
    pub const NOTIFY_CORP_WEBHOOK_URL: ItemId = ItemId::new("Notify", "CompanyWebHookBotUrl");

    fn items() -> Vec<ItemSpec> {
        vec![
            spec(Self::NAME, "New Config"),
            bool_spec(Self::STATUS, true),
            range_spec(Self::REMAINED_DAY, -1, -1, 1024),
            bool_spec(Self::IF_SCRIPT_BEFORE, false),
            ItemSpec::with(Self::SCRIPT_BEFORE, "", Validator::File),
            bool_spec(Self::IF_SCRIPT_AFTER, false),
            ItemSpec::with(Self::SCRIPT_AFTER, "", Validator::File),
            spec(Self::NOTES, "-"),
            spec(Self::LAST_PROXY_DATE, "2000-01-01"),
            range_spec(Self::PROXY_TIMES, 0, 0, 1024),
            bool_spec(Self::NOTIFY_ENABLED, false),
            bool_spec(Self::NOTIFY_STATISTIC, false),
            bool_spec(Self::NOTIFY_MAIL, false),
            spec(Self::NOTIFY_TO_ADDRESS, ""),
            bool_spec(Self::NOTIFY_SERVER_CHAN, false),
            spec(Self::NOTIFY_SERVER_CHAN_KEY, ""),
            spec(Self::NOTIFY_SERVER_CHAN_CHANNEL, ""),
            spec(Self::NOTIFY_SERVER_CHAN_TAG, ""),
            bool_spec(Self::NOTIFY_CORP_WEBHOOK, false),
            spec(Self::NOTIFY_CORP_WEBHOOK_URL, ""),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_defaults_and_slots() {
        let mut queue = QueueConfig::new();
        assert!(!queue.get_bool(QueueConfig::ENABLED));
        assert!(queue.enabled_slots().is_empty());

        queue.set(QueueConfig::TIME_ENABLED[0], true);
        queue.set(QueueConfig::TIME_SET[0], "08:00");
        queue.set(QueueConfig::TIME_ENABLED[9], true);
        assert_eq!(queue.enabled_slots(), vec!["08:00", "00:00"]);
    }

    #[test]
    fn test_after_accomplish_options() {
        let mut queue = QueueConfig::new();
        assert!(queue.set(QueueConfig::AFTER_ACCOMPLISH, "Shutdown"));
        assert!(!queue.set(QueueConfig::AFTER_ACCOMPLISH, "Reboot"));
        assert_eq!(queue.get_str(QueueConfig::AFTER_ACCOMPLISH), "Shutdown");
    }

    #[test]
    fn test_run_limits_clamped() {
        let mut maa = MaaConfig::new();
        assert!(maa.set(MaaConfig::RUN_TIMES_LIMIT, 5000));
        assert_eq!(maa.get_int(MaaConfig::RUN_TIMES_LIMIT), 1024);
        assert!(maa.set(MaaConfig::ADB_SEARCH_RANGE, -2));
        assert_eq!(maa.get_int(MaaConfig::ADB_SEARCH_RANGE), 0);
    }

    #[test]
    fn test_plan_table_all_mode() {
        let mut plan = MaaPlanConfig::new();
        let stage_all = MaaPlanConfig::item("ALL", "Stage").unwrap();
        plan.set(stage_all, "1-7");
        let values = plan.current_values(Weekday::Wed);
        assert_eq!(values.stage, "1-7");
    }

    #[test]
    fn test_plan_table_weekly_mode() {
        let mut plan = MaaPlanConfig::new();
        plan.set(MaaPlanConfig::MODE, "Weekly");
        plan.set(MaaPlanConfig::item("Friday", "Stage").unwrap(), "CE-6");
        assert_eq!(plan.current_values(Weekday::Fri).stage, "CE-6");
        assert_eq!(plan.current_values(Weekday::Mon).stage, "-");
    }

    #[test]
    fn test_plan_item_rejects_unknown_cell() {
        assert!(MaaPlanConfig::item("ALL", "Stage").is_some());
        assert!(MaaPlanConfig::item("Someday", "Stage").is_none());
        assert!(MaaPlanConfig::item("ALL", "Bogus").is_none());
    }

    #[test]
    fn test_user_plan_info_fixed_mode() {
        let mut user = MaaUserConfig::new();
        user.set(MaaUserConfig::STAGE, "CE-6");
        user.set(MaaUserConfig::MEDICINE_NUMB, 2);
        let values = user.plan_info(None, Weekday::Mon);
        assert_eq!(values.stage, "CE-6");
        assert_eq!(values.medicine_numb, 2);
        assert!(user.plan_reference().is_none());
    }

    #[test]
    fn test_user_plan_info_follows_plan() {
        let mut user = MaaUserConfig::new();
        user.set(MaaUserConfig::STAGE_MODE, "Plan_1");
        assert_eq!(user.plan_reference().as_deref(), Some("Plan_1"));

        let mut plan = MaaPlanConfig::new();
        plan.set(MaaPlanConfig::item("ALL", "Stage").unwrap(), "AP-5");
        let values = user.plan_info(Some(&plan), Weekday::Mon);
        assert_eq!(values.stage, "AP-5");
    }

    #[test]
    fn test_global_to_map_shape() {
        let global = GlobalConfig::new();
        let map = global.to_map();
        assert_eq!(map["Update"]["UpdateType"], json!("stable"));
        assert_eq!(map["Notify"]["SendTaskResultTime"], json!("Never"));
    }
}
