//! On-disk schema migration.
//!
//! A single-row `version` table in `data/data.db` marks the data layout
//! version. `check_data` walks an ordered chain of one-step migrations
//! from the stored version to [`CURRENT_VERSION`]; once the first step
//! runs, every later step runs too, so the chain always terminates at the
//! current version. Steps are best-effort per entity: a member whose
//! legacy artifact is missing is logged and skipped, never fatal.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Value, json};

use crate::documents::STAGE_GROUPS;
use crate::error::Result;
use crate::platform::PlatformOps;
use crate::registry::trailing_index;

/// Layout version written by this release.
pub const CURRENT_VERSION: &str = "v1.7";

const VERSIONS: [&str; 4] = ["v1.4", "v1.5", "v1.6", "v1.7"];

pub struct MigrationContext<'a> {
    pub base: &'a Path,
    pub platform: &'a dyn PlatformOps,
}

struct MigrationStep {
    to: &'static str,
    run: fn(&MigrationContext) -> Result<()>,
}

/// `STEPS[i]` migrates `VERSIONS[i]` to `VERSIONS[i + 1]`.
const STEPS: [MigrationStep; 3] = [
    MigrationStep {
        to: "v1.5",
        run: step_accounts_to_documents,
    },
    MigrationStep {
        to: "v1.6",
        run: step_remove_autostart,
    },
    MigrationStep {
        to: "v1.7",
        run: step_rename_stage_fields,
    },
];

/// Check the stored layout version and migrate forward as needed.
/// Idempotent: at the current version this reads the marker and returns.
pub fn check_data(base: &Path, platform: &dyn PlatformOps) -> Result<()> {
    let db_path = base.join("data/data.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(&db_path)?;
    conn.execute("CREATE TABLE IF NOT EXISTS version(v TEXT)", [])?;
    let stored: Option<String> = conn
        .query_row("SELECT v FROM version", [], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let stored = match stored {
        Some(version) => version,
        None => {
            // fresh install: stamp the current version, nothing to migrate
            conn.execute("INSERT INTO version VALUES (?1)", [CURRENT_VERSION])?;
            return Ok(());
        }
    };

    if stored == CURRENT_VERSION {
        return Ok(());
    }
    let Some(start) = VERSIONS.iter().position(|v| *v == stored) else {
        tracing::warn!("unknown data version '{stored}', leaving data untouched");
        return Ok(());
    };

    tracing::info!("data migration: {stored} -> {CURRENT_VERSION}");
    let ctx = MigrationContext { base, platform };
    for step in &STEPS[start..] {
        tracing::info!("data migration step -> {}", step.to);
        (step.run)(&ctx)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM version", [])?;
        tx.execute("INSERT INTO version VALUES (?1)", [step.to])?;
        tx.commit()?;
    }
    tracing::info!("data migration finished");
    Ok(())
}

fn member_dirs(base: &Path, scope: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(base.join("config").join(scope)) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort_by_key(|dir| {
        dir.file_name()
            .and_then(|n| trailing_index(&n.to_string_lossy()))
            .unwrap_or(u64::MAX)
    });
    dirs
}

/// v1.4 → v1.5: flatten each member's legacy per-account table into one
/// directory-and-file per account, re-encoding the secret column as
/// base64, and move the per-account side files along.
fn step_accounts_to_documents(ctx: &MigrationContext) -> Result<()> {
    for member_dir in member_dirs(ctx.base, "MaaConfig") {
        let legacy = member_dir.join("user_data.db");
        if !legacy.is_file() {
            tracing::debug!("no legacy account table in {}", member_dir.display());
            continue;
        }
        if let Err(e) = convert_member_accounts(&member_dir, &legacy) {
            tracing::warn!(
                "skipping account conversion for {}: {e}",
                member_dir.display()
            );
        }
    }
    Ok(())
}

struct LegacyAccount {
    name: String,
    id: String,
    server: String,
    remained_day: i64,
    status: String,
    last_proxy_date: String,
    game_id: String,
    game_id_1: String,
    game_id_2: String,
    routine: String,
    annihilation: String,
    infrastructure: String,
    password: Vec<u8>,
    notes: String,
    proxy_times: i64,
    mode: String,
    uid: String,
}

fn convert_member_accounts(member_dir: &Path, legacy: &Path) -> Result<()> {
    let conn = Connection::open(legacy)?;
    let mut stmt = conn.prepare("SELECT * FROM adminx")?;
    let mut accounts: Vec<LegacyAccount> = stmt
        .query_map([], |row| {
            let password = match row.get_ref(12)? {
                ValueRef::Blob(bytes) => bytes.to_vec(),
                ValueRef::Text(text) => text.to_vec(),
                _ => Vec::new(),
            };
            Ok(LegacyAccount {
                name: row.get(0)?,
                id: row.get(1)?,
                server: row.get(2)?,
                remained_day: row.get(3)?,
                status: row.get(4)?,
                last_proxy_date: row.get(5)?,
                game_id: row.get(6)?,
                game_id_1: row.get(7)?,
                game_id_2: row.get(8)?,
                routine: row.get(9)?,
                annihilation: row.get(10)?,
                infrastructure: row.get(11)?,
                password,
                notes: row.get(13)?,
                proxy_times: row.get(14)?,
                mode: row.get(15)?,
                uid: row.get(16)?,
            })
        })?
        .collect::<std::result::Result<_, _>>()?;
    drop(stmt);
    drop(conn);

    // legacy ordering: "simple" accounts before "beta", then by index
    accounts.sort_by(|a, b| {
        (std::cmp::Reverse(a.mode.len()), &a.uid).cmp(&(std::cmp::Reverse(b.mode.len()), &b.uid))
    });

    std::fs::remove_file(legacy)?;

    for (i, account) in accounts.iter().enumerate() {
        let user_dir = member_dir.join(format!("UserData/User_{}", i + 1));
        std::fs::create_dir_all(&user_dir)?;

        // legacy field names on purpose: the rename step further down the
        // chain moves them to their current names
        let document = json!({
            "Data": {
                "IfPassCheck": true,
                "LastAnnihilationDate": "2000-01-01",
                "LastProxyDate": account.last_proxy_date,
                "ProxyTimes": account.proxy_times,
            },
            "Info": {
                "Annihilation": account.annihilation == "y",
                "GameId": account.game_id,
                "GameIdMode": "Fixed",
                "GameId_1": account.game_id_1,
                "GameId_2": account.game_id_2,
                "Id": account.id,
                "Infrastructure": account.infrastructure == "y",
                "MedicineNumb": 0,
                "Mode": if account.mode == "simple" { "simple" } else { "detailed" },
                "Name": account.name,
                "Notes": account.notes,
                "Password": BASE64.encode(&account.password),
                "RemainedDay": account.remained_day,
                "Routine": account.routine == "y",
                "Server": account.server,
                "Status": account.status == "y",
            },
        });
        std::fs::write(
            user_dir.join("config.json"),
            serde_json::to_string_pretty(&document)
                .map_err(|e| crate::error::MaadeskError::Config(e.to_string()))?,
        )?;

        let legacy_base = member_dir.join(&account.mode).join(&account.uid);
        for (src, dst_dir, dst_file) in [
            ("annihilation/gui.json", "Annihilation", "gui.json"),
            ("routine/gui.json", "Routine", "gui.json"),
            (
                "infrastructure/infrastructure.json",
                "Infrastructure",
                "infrastructure.json",
            ),
        ] {
            let from = legacy_base.join(src);
            if from.is_file() {
                let to_dir = user_dir.join(dst_dir);
                std::fs::create_dir_all(&to_dir)?;
                std::fs::rename(&from, to_dir.join(dst_file))?;
            }
        }
    }

    for mode_dir in ["simple", "beta"] {
        let dir = member_dir.join(mode_dir);
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
        }
    }
    Ok(())
}

/// v1.5 → v1.6: drop the legacy autostart registration.
fn step_remove_autostart(ctx: &MigrationContext) -> Result<()> {
    if let Err(e) = ctx.platform.remove_autostart() {
        tracing::warn!("autostart cleanup skipped: {e}");
    }
    Ok(())
}

/// v1.6 → v1.7: rename the `GameId*` fields to `Stage*` in every user
/// document and every plan-table document.
fn step_rename_stage_fields(ctx: &MigrationContext) -> Result<()> {
    const USER_RENAMES: [(&str, &str); 5] = [
        ("GameId", "Stage"),
        ("GameIdMode", "StageMode"),
        ("GameId_1", "Stage_1"),
        ("GameId_2", "Stage_2"),
        ("GameId_Remain", "Stage_Remain"),
    ];
    const PLAN_RENAMES: [(&str, &str); 4] = [
        ("GameId", "Stage"),
        ("GameId_1", "Stage_1"),
        ("GameId_2", "Stage_2"),
        ("GameId_Remain", "Stage_Remain"),
    ];

    for member_dir in member_dirs(ctx.base, "MaaConfig") {
        let Ok(users) = std::fs::read_dir(member_dir.join("UserData")) else {
            continue;
        };
        for user_dir in users.filter_map(|e| e.ok().map(|e| e.path())) {
            let file = user_dir.join("config.json");
            if !file.is_file() {
                continue;
            }
            if let Err(e) = rename_in_group(&file, "Info", &USER_RENAMES) {
                tracing::warn!("skipping field rename for {}: {e}", file.display());
            }
        }
    }

    for plan_dir in member_dirs(ctx.base, "MaaPlanConfig") {
        let file = plan_dir.join("config.json");
        if !file.is_file() {
            continue;
        }
        for group in STAGE_GROUPS {
            if let Err(e) = rename_in_group(&file, group, &PLAN_RENAMES) {
                tracing::warn!("skipping field rename for {}: {e}", file.display());
            }
        }
    }
    Ok(())
}

fn rename_in_group(file: &Path, group: &str, renames: &[(&str, &str)]) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    let mut document: Value = serde_json::from_str(&text)
        .map_err(|e| crate::error::MaadeskError::Config(e.to_string()))?;
    let Some(map) = document.get_mut(group).and_then(Value::as_object_mut) else {
        return Ok(());
    };
    let mut changed = false;
    for (old, new) in renames {
        if let Some(value) = map.remove(*old) {
            map.insert((*new).to_string(), value);
            changed = true;
        }
    }
    if changed {
        std::fs::write(
            file,
            serde_json::to_string_pretty(&document)
                .map_err(|e| crate::error::MaadeskError::Config(e.to_string()))?,
        )?;
    }
    Ok(())
}

/// Direct read of the stored version marker (test and diagnostics aid).
pub fn stored_version(base: &Path) -> Result<Option<String>> {
    let db_path = base.join("data/data.db");
    if !db_path.exists() {
        return Ok(None);
    }
    let conn = Connection::open(&db_path)?;
    let version = conn
        .query_row("SELECT v FROM version", [], |row| row.get(0))
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NullPlatform;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("maadesk-migrate-{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn set_version(base: &Path, version: &str) {
        let db_path = base.join("data/data.db");
        std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
        let conn = Connection::open(&db_path).unwrap();
        conn.execute("CREATE TABLE IF NOT EXISTS version(v TEXT)", [])
            .unwrap();
        conn.execute("DELETE FROM version", []).unwrap();
        conn.execute("INSERT INTO version VALUES (?1)", [version])
            .unwrap();
    }

    fn write_legacy_accounts(member_dir: &Path) {
        std::fs::create_dir_all(member_dir).unwrap();
        let conn = Connection::open(member_dir.join("user_data.db")).unwrap();
        conn.execute(
            "CREATE TABLE adminx(name, id, server, day, status, last_date, game, game_1,
             game_2, routine, annihilation, infrastructure, password, notes, numb, mode, uid)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO adminx VALUES ('alpha', '12345', 'Official', 30, 'y', '2025-01-01',
             '1-7', 'CE-6', '-', 'y', 'n', 'y', X'736563726574', 'none', 7, 'simple', '1')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO adminx VALUES ('beta-user', '67890', 'Bilibili', -1, 'n', '2025-02-02',
             'LS-6', '-', '-', 'n', 'y', 'n', X'70617373', 'none', 2, 'beta', '1')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_fresh_install_stamps_current_version() {
        let base = scratch("fresh");
        check_data(&base, &NullPlatform).unwrap();
        assert_eq!(
            stored_version(&base).unwrap().as_deref(),
            Some(CURRENT_VERSION)
        );
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_idempotent_at_current_version() {
        let base = scratch("idempotent");
        let config = base.join("config/MaaConfig/Script_1/UserData/User_1/config.json");
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, r#"{"Info": {"Stage": "1-7"}}"#).unwrap();

        check_data(&base, &NullPlatform).unwrap();
        let before = std::fs::read_to_string(&config).unwrap();
        check_data(&base, &NullPlatform).unwrap();
        let after = std::fs::read_to_string(&config).unwrap();
        assert_eq!(before, after);
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_full_chain_from_v1_4() {
        let base = scratch("chain");
        set_version(&base, "v1.4");
        let member_dir = base.join("config/MaaConfig/Script_1");
        write_legacy_accounts(&member_dir);
        // per-account side file in the legacy layout
        let side = member_dir.join("simple/1/annihilation/gui.json");
        std::fs::create_dir_all(side.parent().unwrap()).unwrap();
        std::fs::write(&side, "{}").unwrap();

        check_data(&base, &NullPlatform).unwrap();

        assert_eq!(
            stored_version(&base).unwrap().as_deref(),
            Some(CURRENT_VERSION)
        );
        assert!(!member_dir.join("user_data.db").exists());
        assert!(!member_dir.join("simple").exists());

        // "simple" account sorted first
        let user_1: Value = serde_json::from_str(
            &std::fs::read_to_string(member_dir.join("UserData/User_1/config.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(user_1["Info"]["Name"], "alpha");
        // secret column re-encoded as portable text
        assert_eq!(user_1["Info"]["Password"], "c2VjcmV0");
        // rename step already ran over the converted file
        assert_eq!(user_1["Info"]["Stage"], "1-7");
        assert_eq!(user_1["Info"]["StageMode"], "Fixed");
        assert!(user_1["Info"].get("GameId").is_none());
        assert!(
            member_dir
                .join("UserData/User_1/Annihilation/gui.json")
                .is_file()
        );

        let user_2: Value = serde_json::from_str(
            &std::fs::read_to_string(member_dir.join("UserData/User_2/config.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(user_2["Info"]["Name"], "beta-user");
        assert_eq!(user_2["Info"]["Mode"], "detailed");
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_member_without_legacy_table_is_skipped() {
        let base = scratch("skip");
        set_version(&base, "v1.4");
        std::fs::create_dir_all(base.join("config/MaaConfig/Script_1")).unwrap();
        check_data(&base, &NullPlatform).unwrap();
        assert_eq!(
            stored_version(&base).unwrap().as_deref(),
            Some(CURRENT_VERSION)
        );
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_rename_step_covers_plans() {
        let base = scratch("plans");
        set_version(&base, "v1.6");
        let plan = base.join("config/MaaPlanConfig/Plan_1/config.json");
        std::fs::create_dir_all(plan.parent().unwrap()).unwrap();
        std::fs::write(
            &plan,
            r#"{"ALL": {"GameId": "CE-6", "GameId_1": "-", "GameId_2": "-", "GameId_Remain": "-"},
               "Monday": {"GameId": "LS-6"}}"#,
        )
        .unwrap();

        check_data(&base, &NullPlatform).unwrap();

        let migrated: Value =
            serde_json::from_str(&std::fs::read_to_string(&plan).unwrap()).unwrap();
        assert_eq!(migrated["ALL"]["Stage"], "CE-6");
        assert!(migrated["ALL"].get("GameId").is_none());
        assert_eq!(migrated["Monday"]["Stage"], "LS-6");
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn test_unknown_version_left_untouched() {
        let base = scratch("unknown");
        set_version(&base, "v0.9");
        check_data(&base, &NullPlatform).unwrap();
        assert_eq!(stored_version(&base).unwrap().as_deref(), Some("v0.9"));
        std::fs::remove_dir_all(&base).ok();
    }
}
