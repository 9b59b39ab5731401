//! Factorization: merge canonical texts that turn out to be the same text.
//!
//! Linked versions sharing a key value but pointing at several `textes` ids are
//! collapsed onto one row, provided they all agree on `nature`. The absorbed
//! rows stay in `textes` until the final cleanup finds them unreferenced.

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::Store;
use crate::error::Result;
use crate::keys::MergeKey;

struct Statements {
    groups: &'static str,
    ids: &'static str,
    insert: &'static str,
    lookup: &'static str,
}

const BY_TITREFULL_S: Statements = Statements {
    groups: "
        SELECT titrefull_s, min(nature)
          FROM textes_versions
         WHERE texte_id IS NOT NULL
           AND titrefull_s IS NOT NULL
      GROUP BY titrefull_s
        HAVING min(texte_id) <> max(texte_id)
           AND min(nature) = max(nature)
      ORDER BY titrefull_s",
    ids: "
        SELECT DISTINCT texte_id
          FROM textes_versions
         WHERE titrefull_s = ?1
           AND texte_id IS NOT NULL
      ORDER BY texte_id",
    insert: "INSERT OR IGNORE INTO textes (nature, titrefull_s) VALUES (?1, ?2)",
    lookup: "SELECT id FROM textes WHERE titrefull_s = ?1",
};

const REPOINT: &str = "UPDATE textes_versions SET texte_id = ?1 WHERE texte_id = ?2";

fn statements(key: MergeKey) -> &'static Statements {
    match key {
        MergeKey::TitrefullS => &BY_TITREFULL_S,
    }
}

/// One key value whose linked versions are spread over several `textes` ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub value: String,
    pub nature: String,
    pub ids: Vec<i64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Factorized {
    /// Duplicate groups collapsed into a single text.
    pub groups: usize,
    /// Distinct `textes` ids absorbed by those groups.
    pub absorbed: usize,
    /// Version rows pointed at their new text.
    pub repointed: usize,
}

/// Find every duplicate group for `key`, as the versions stand now.
pub fn plan<S: Store>(store: &S, key: MergeKey) -> Result<Vec<DuplicateGroup>> {
    let sql = statements(key);
    let heads: Vec<(String, String)> =
        store.all(sql.groups, &[], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut groups = Vec::with_capacity(heads.len());
    for (value, nature) in heads {
        let ids = linked_ids(store, sql, &value)?;
        groups.push(DuplicateGroup { value, nature, ids });
    }
    Ok(groups)
}

fn linked_ids<S: Store>(store: &S, sql: &Statements, value: &str) -> Result<Vec<i64>> {
    store.all(sql.ids, &[&value], |row| row.get::<_, i64>(0))
}

/// Merge duplicate canonical texts sharing `key`.
///
/// A group's ids are read again right before it is merged: repointing an
/// earlier group moves every version of the ids it absorbs, whatever their key.
pub fn factorize<S: Store>(store: &S, key: MergeKey) -> Result<Factorized> {
    let sql = statements(key);
    let mut done = Factorized::default();

    for group in plan(store, key)? {
        let ids = linked_ids(store, sql, &group.value)?;
        if ids.len() < 2 {
            debug!(%key, value = %group.value, "already merged by an earlier group");
            continue;
        }

        store.run(sql.insert, &[&group.nature, &group.value])?;
        let Some(target) = store.one::<i64>(sql.lookup, &[&group.value])? else {
            warn!(%key, value = %group.value, "no canonical row after insert, group skipped");
            continue;
        };

        let mut absorbed = 0;
        let mut repointed = 0;
        for old in ids.iter().filter(|&&id| id != target) {
            repointed += store.run(REPOINT, &[&target, old])?;
            absorbed += 1;
        }
        debug!(
            %key,
            value = %group.value,
            merged_into = target,
            planned = ?group.ids,
            absorbed = ?ids,
            repointed,
            "factorized"
        );

        done.groups += 1;
        done.absorbed += absorbed;
        done.repointed += repointed;
    }
    Ok(done)
}
