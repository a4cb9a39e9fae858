//! On-disk entity registry: members, queues, and plan-tables.
//!
//! Entities live under `config/<ScopeDir>/<Identifier>/` and are loaded by
//! the `search_*` scans. Each scan re-saves every loaded document so that
//! files written by older releases pick up newly added default fields.
//! Collections are always kept sorted by the trailing integer of the
//! identifier — that ordering defines display and lookup order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::documents::{
    GeneralConfig, GeneralSubConfig, MaaConfig, MaaPlanConfig, MaaUserConfig, QueueConfig,
};

/// Which flavour of automation a member runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A scripted game account driven by the assistant engine.
    Maa,
    /// An arbitrary external script.
    General,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Maa => "Maa",
            MemberKind::General => "General",
        }
    }
}

/// Member-level run parameters, per kind.
#[derive(Debug)]
pub enum MemberConfig {
    Maa(MaaConfig),
    General(GeneralConfig),
}

/// Per-account (or per-sub-configuration) document, per kind.
#[derive(Debug)]
pub enum UserConfig {
    Maa(MaaUserConfig),
    General(GeneralSubConfig),
}

/// A managed automation entity and its nested user data.
#[derive(Debug)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub path: PathBuf,
    pub config: MemberConfig,
    pub users: Vec<UserEntry>,
}

#[derive(Debug)]
pub struct UserEntry {
    pub name: String,
    pub path: PathBuf,
    pub config: UserConfig,
}

#[derive(Debug)]
pub struct QueueEntry {
    pub name: String,
    pub path: PathBuf,
    pub config: QueueConfig,
}

#[derive(Debug)]
pub struct PlanEntry {
    pub name: String,
    pub path: PathBuf,
    pub config: MaaPlanConfig,
}

/// Post-run field updates committed back into one user/sub document.
#[derive(Debug, Clone, Default)]
pub struct UserRunUpdate {
    pub remained_day: i64,
    pub last_proxy_date: String,
    pub last_annihilation_date: Option<String>,
    pub last_skland_date: Option<String>,
    pub proxy_times: i64,
    pub if_pass_check: bool,
    pub custom_infrast_index: Option<String>,
}

/// Sort key: the integer after the final `_` of an identifier.
/// Entries without one sort after all indexed entries.
pub fn trailing_index(name: &str) -> Option<u64> {
    name.rsplit_once('_')?.1.parse().ok()
}

fn sort_rank(name: &str) -> u64 {
    trailing_index(name).unwrap_or(u64::MAX)
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect()
}

/// All loaded entities, addressed by identifier.
#[derive(Debug)]
pub struct Registry {
    base: PathBuf,
    pub members: Vec<Member>,
    pub queues: Vec<QueueEntry>,
    pub plans: Vec<PlanEntry>,
}

impl Registry {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            members: Vec::new(),
            queues: Vec::new(),
            plans: Vec::new(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base.join("config")
    }

    /// Rebuild the member collection from `config/MaaConfig/*/` and
    /// `config/GeneralConfig/*/`. Loaded documents are re-saved
    /// immediately so older files are normalized to the current schema.
    pub fn search_member(&mut self) {
        let mut members = Vec::new();
        for dir in subdirectories(&self.config_dir().join("MaaConfig")) {
            let config = MaaConfig::load_from(dir.join("config.json"));
            config.save();
            members.push(Member {
                name: dir_name(&dir),
                kind: MemberKind::Maa,
                path: dir,
                config: MemberConfig::Maa(config),
                users: Vec::new(),
            });
        }
        for dir in subdirectories(&self.config_dir().join("GeneralConfig")) {
            let config = GeneralConfig::load_from(dir.join("config.json"));
            config.save();
            members.push(Member {
                name: dir_name(&dir),
                kind: MemberKind::General,
                path: dir,
                config: MemberConfig::General(config),
                users: Vec::new(),
            });
        }
        members.sort_by_key(|member| sort_rank(&member.name));
        self.members = members;
        tracing::debug!("registry: {} member(s) loaded", self.members.len());
    }

    /// Load the account documents of one scripted-account member from its
    /// `UserData/` subdirectories.
    pub fn search_maa_user(&mut self, member_name: &str) {
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.name == member_name && m.kind == MemberKind::Maa)
        else {
            tracing::warn!("unknown scripted member: {member_name}");
            return;
        };
        let mut users = Vec::new();
        for dir in subdirectories(&member.path.join("UserData")) {
            let config = MaaUserConfig::load_from(dir.join("config.json"));
            config.save();
            users.push(UserEntry {
                name: dir_name(&dir),
                path: dir,
                config: UserConfig::Maa(config),
            });
        }
        users.sort_by_key(|user| sort_rank(&user.name));
        member.users = users;
    }

    /// Load the sub-configuration documents of one external-script member
    /// from its `SubData/` subdirectories.
    pub fn search_general_sub(&mut self, member_name: &str) {
        let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.name == member_name && m.kind == MemberKind::General)
        else {
            tracing::warn!("unknown external-script member: {member_name}");
            return;
        };
        let mut subs = Vec::new();
        for dir in subdirectories(&member.path.join("SubData")) {
            let config = GeneralSubConfig::load_from(dir.join("config.json"));
            config.save();
            subs.push(UserEntry {
                name: dir_name(&dir),
                path: dir,
                config: UserConfig::General(config),
            });
        }
        subs.sort_by_key(|sub| sort_rank(&sub.name));
        member.users = subs;
    }

    /// Rebuild the queue collection from `config/QueueConfig/*.json`.
    pub fn search_queue(&mut self) {
        let mut queues = Vec::new();
        let dir = self.config_dir().join("QueueConfig");
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                let config = QueueConfig::load_from(&path);
                config.save();
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                queues.push(QueueEntry { name, path, config });
            }
        }
        queues.sort_by_key(|queue| sort_rank(&queue.name));
        self.queues = queues;
        tracing::debug!("registry: {} queue(s) loaded", self.queues.len());
    }

    /// Rebuild the plan-table collection from `config/MaaPlanConfig/*/`.
    pub fn search_plan(&mut self) {
        let mut plans = Vec::new();
        for dir in subdirectories(&self.config_dir().join("MaaPlanConfig")) {
            let config = MaaPlanConfig::load_from(dir.join("config.json"));
            config.save();
            plans.push(PlanEntry {
                name: dir_name(&dir),
                path: dir,
                config,
            });
        }
        plans.sort_by_key(|plan| sort_rank(&plan.name));
        self.plans = plans;
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.name == name)
    }

    pub fn queue(&self, name: &str) -> Option<&QueueEntry> {
        self.queues.iter().find(|q| q.name == name)
    }

    pub fn queue_mut(&mut self, name: &str) -> Option<&mut QueueEntry> {
        self.queues.iter_mut().find(|q| q.name == name)
    }

    pub fn plan(&self, name: &str) -> Option<&PlanEntry> {
        self.plans.iter().find(|p| p.name == name)
    }

    /// Propagate a member rename: every queue member-slot equal to `old`
    /// is rewritten to `new`.
    pub fn change_queue(&mut self, old: &str, new: &str) {
        for queue in &mut self.queues {
            for slot in QueueConfig::MEMBERS {
                if queue.config.get_str(slot) == old {
                    queue.config.set(slot, new);
                }
            }
        }
    }

    /// Propagate a plan-table rename: every user's stage-mode reference
    /// equal to `old` is rewritten to `new`.
    pub fn change_plan(&mut self, old: &str, new: &str) {
        for member in &mut self.members {
            for user in &mut member.users {
                if let UserConfig::Maa(config) = &mut user.config {
                    if config.get_str(MaaUserConfig::STAGE_MODE) == old {
                        config.set(MaaUserConfig::STAGE_MODE, new);
                    }
                }
            }
        }
    }

    /// Commit a batch of post-run updates into a scripted member's user
    /// documents. The caller emits the single data-changed notification
    /// after the batch returns.
    pub fn change_maa_user_info(
        &mut self,
        member_name: &str,
        updates: &HashMap<String, UserRunUpdate>,
    ) {
        let Some(member) = self.member_mut(member_name) else {
            tracing::warn!("post-run commit for unknown member: {member_name}");
            return;
        };
        for user in &mut member.users {
            let Some(update) = updates.get(&user.name) else {
                continue;
            };
            let UserConfig::Maa(config) = &mut user.config else {
                continue;
            };
            config.set(MaaUserConfig::REMAINED_DAY, update.remained_day);
            config.set(MaaUserConfig::LAST_PROXY_DATE, update.last_proxy_date.as_str());
            if let Some(date) = &update.last_annihilation_date {
                config.set(MaaUserConfig::LAST_ANNIHILATION_DATE, date.as_str());
            }
            if let Some(date) = &update.last_skland_date {
                config.set(MaaUserConfig::LAST_SKLAND_DATE, date.as_str());
            }
            config.set(MaaUserConfig::PROXY_TIMES, update.proxy_times);
            config.set(MaaUserConfig::IF_PASS_CHECK, update.if_pass_check);
            if let Some(index) = &update.custom_infrast_index {
                config.set(MaaUserConfig::CUSTOM_INFRAST_INDEX, index.as_str());
            }
        }
    }

    /// Commit a batch of post-run updates into an external-script member's
    /// sub documents.
    pub fn change_general_sub_info(
        &mut self,
        member_name: &str,
        updates: &HashMap<String, UserRunUpdate>,
    ) {
        let Some(member) = self.member_mut(member_name) else {
            tracing::warn!("post-run commit for unknown member: {member_name}");
            return;
        };
        for sub in &mut member.users {
            let Some(update) = updates.get(&sub.name) else {
                continue;
            };
            let UserConfig::General(config) = &mut sub.config else {
                continue;
            };
            config.set(GeneralSubConfig::REMAINED_DAY, update.remained_day);
            config.set(
                GeneralSubConfig::LAST_PROXY_DATE,
                update.last_proxy_date.as_str(),
            );
            config.set(GeneralSubConfig::PROXY_TIMES, update.proxy_times);
        }
    }

    /// Stamp a queue's last-launch timestamp and human-readable history.
    /// Unknown queues are logged and ignored.
    pub fn save_history(&mut self, queue_name: &str, time: &str, history: &str) {
        match self.queue_mut(queue_name) {
            Some(queue) => {
                queue.config.set(QueueConfig::LAST_PROXY_TIME, time);
                queue.config.set(QueueConfig::LAST_PROXY_HISTORY, history);
            }
            None => tracing::warn!("history for unknown queue: {queue_name}"),
        }
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-registry-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_json(path: &Path, value: serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_search_member_sorts_by_trailing_index() {
        let base = scratch("sort");
        for name in ["Script_10", "Script_2", "Script_1"] {
            write_json(
                &base.join(format!("config/MaaConfig/{name}/config.json")),
                json!({"MaaSet": {"Name": name}}),
            );
        }
        let mut registry = Registry::new(&base);
        registry.search_member();
        let names: Vec<&str> = registry.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Script_1", "Script_2", "Script_10"]);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_search_member_heals_old_files() {
        let base = scratch("heal");
        let config_file = base.join("config/MaaConfig/Script_1/config.json");
        write_json(&config_file, json!({"MaaSet": {"Name": "old"}}));

        let mut registry = Registry::new(&base);
        registry.search_member();

        let healed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config_file).unwrap()).unwrap();
        assert_eq!(healed["RunSet"]["RunTimesLimit"], json!(3));
        assert_eq!(healed["MaaSet"]["Name"], json!("old"));
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_search_queue_and_rename_propagation() {
        let base = scratch("rename");
        write_json(
            &base.join("config/QueueConfig/Queue_1.json"),
            json!({"Queue": {"Member_1": "Script_1", "Member_7": "Script_1", "Member_2": "Script_2"}}),
        );
        let mut registry = Registry::new(&base);
        registry.search_queue();
        registry.change_queue("Script_1", "Script_9");

        let queue = registry.queue("Queue_1").unwrap();
        assert_eq!(queue.config.get_str(QueueConfig::MEMBERS[0]), "Script_9");
        assert_eq!(queue.config.get_str(QueueConfig::MEMBERS[6]), "Script_9");
        assert_eq!(queue.config.get_str(QueueConfig::MEMBERS[1]), "Script_2");
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_change_plan_rewrites_user_references() {
        let base = scratch("plan-ref");
        write_json(
            &base.join("config/MaaConfig/Script_1/config.json"),
            json!({"MaaSet": {"Name": "s1"}}),
        );
        write_json(
            &base.join("config/MaaConfig/Script_1/UserData/User_1/config.json"),
            json!({"Info": {"StageMode": "Plan_1"}}),
        );
        write_json(
            &base.join("config/MaaConfig/Script_1/UserData/User_2/config.json"),
            json!({"Info": {"StageMode": "Fixed"}}),
        );

        let mut registry = Registry::new(&base);
        registry.search_member();
        registry.search_maa_user("Script_1");
        registry.change_plan("Plan_1", "Plan_3");

        let member = registry.member("Script_1").unwrap();
        let modes: Vec<String> = member
            .users
            .iter()
            .map(|user| match &user.config {
                UserConfig::Maa(c) => c.get_str(MaaUserConfig::STAGE_MODE),
                UserConfig::General(_) => unreachable!(),
            })
            .collect();
        assert_eq!(modes, vec!["Plan_3", "Fixed"]);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_change_maa_user_info_batch() {
        let base = scratch("batch");
        write_json(
            &base.join("config/MaaConfig/Script_1/config.json"),
            json!({"MaaSet": {"Name": "s1"}}),
        );
        write_json(
            &base.join("config/MaaConfig/Script_1/UserData/User_1/config.json"),
            json!({"Info": {"Name": "alpha"}}),
        );

        let mut registry = Registry::new(&base);
        registry.search_member();
        registry.search_maa_user("Script_1");

        let mut updates = HashMap::new();
        updates.insert(
            "User_1".to_string(),
            UserRunUpdate {
                remained_day: 30,
                last_proxy_date: "2026-08-07".into(),
                last_annihilation_date: Some("2026-08-05".into()),
                last_skland_date: None,
                proxy_times: 4,
                if_pass_check: false,
                custom_infrast_index: Some("2".into()),
            },
        );
        registry.change_maa_user_info("Script_1", &updates);

        let member = registry.member("Script_1").unwrap();
        let UserConfig::Maa(config) = &member.users[0].config else {
            unreachable!()
        };
        assert_eq!(config.get_int(MaaUserConfig::REMAINED_DAY), 30);
        assert_eq!(config.get_str(MaaUserConfig::LAST_PROXY_DATE), "2026-08-07");
        assert_eq!(config.get_int(MaaUserConfig::PROXY_TIMES), 4);
        assert!(!config.get_bool(MaaUserConfig::IF_PASS_CHECK));
        assert_eq!(config.get_str(MaaUserConfig::CUSTOM_INFRAST_INDEX), "2");
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_save_history_stamps_queue() {
        let base = scratch("history");
        write_json(&base.join("config/QueueConfig/Queue_1.json"), json!({}));
        let mut registry = Registry::new(&base);
        registry.search_queue();

        registry.save_history("Queue_1", "2026-08-07 08:00:12", "1 member done");
        let queue = registry.queue("Queue_1").unwrap();
        assert_eq!(
            queue.config.get_str(QueueConfig::LAST_PROXY_TIME),
            "2026-08-07 08:00:12"
        );
        // unknown queue: logged, no panic
        registry.save_history("Queue_99", "x", "y");
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_trailing_index() {
        assert_eq!(trailing_index("Script_12"), Some(12));
        assert_eq!(trailing_index("Queue_1"), Some(1));
        assert_eq!(trailing_index("noindex"), None);
        assert_eq!(trailing_index("Plan_x"), None);
    }
}
