//! Connecting: point unlinked version rows at an existing canonical text.
//!
//! Two sources of truth exist for a key value:
//! - the `textes` row carrying it ([`attach_to_canonical`]), which is how
//!   `(nature, num)` always links and how freshly inserted rows are picked up;
//! - already linked versions sharing it ([`connect`] for `nor` and
//!   `titrefull_s`), through a temp table that only keeps values pointing at a
//!   single `texte_id`.

use tracing::debug;

use crate::db::{Store, TempTable};
use crate::error::Result;
use crate::keys::IdentityKey;

const ATTACH_BY_NATURE_NUM: &str = "
    UPDATE textes_versions
       SET texte_id = (
               SELECT t.id
                 FROM textes t
                WHERE t.nature = textes_versions.nature
                  AND t.num = textes_versions.num
           )
     WHERE texte_id IS NULL
       AND EXISTS (
               SELECT 1
                 FROM textes t
                WHERE t.nature = textes_versions.nature
                  AND t.num = textes_versions.num
           )";

const ATTACH_BY_NOR: &str = "
    UPDATE textes_versions
       SET texte_id = (
               SELECT t.id
                 FROM textes t
                WHERE t.nor = textes_versions.nor
           )
     WHERE texte_id IS NULL
       AND EXISTS (
               SELECT 1
                 FROM textes t
                WHERE t.nor = textes_versions.nor
           )";

const ATTACH_BY_TITREFULL_S: &str = "
    UPDATE textes_versions
       SET texte_id = (
               SELECT t.id
                 FROM textes t
                WHERE t.titrefull_s = textes_versions.titrefull_s
           )
     WHERE texte_id IS NULL
       AND EXISTS (
               SELECT 1
                 FROM textes t
                WHERE t.titrefull_s = textes_versions.titrefull_s
           )";

/// Lookup from a key value to the one `texte_id` its linked versions agree on.
struct Mapping {
    table: &'static str,
    create: &'static str,
    index: &'static str,
    size: &'static str,
    apply: &'static str,
    drop: &'static str,
}

// A nor group is trusted only when nature, num and texte_id are constant.
const NOR_MAPPING: Mapping = Mapping {
    table: "texte_by_nor",
    create: "
        CREATE TEMP TABLE texte_by_nor AS
            SELECT nor, min(texte_id) AS texte_id
              FROM textes_versions
             WHERE nor IS NOT NULL
               AND texte_id IS NOT NULL
          GROUP BY nor
            HAVING min(nature) = max(nature)
               AND min(num) = max(num)
               AND min(texte_id) = max(texte_id)",
    index: "CREATE UNIQUE INDEX temp.texte_by_nor_index ON texte_by_nor (nor)",
    size: "SELECT count(*) FROM temp.texte_by_nor",
    apply: "
        UPDATE textes_versions
           SET texte_id = (
                   SELECT m.texte_id
                     FROM temp.texte_by_nor m
                    WHERE m.nor = textes_versions.nor
               )
         WHERE texte_id IS NULL
           AND EXISTS (
                   SELECT 1
                     FROM temp.texte_by_nor m
                    WHERE m.nor = textes_versions.nor
               )",
    drop: "DROP TABLE IF EXISTS temp.texte_by_nor",
};

const TITREFULL_S_MAPPING: Mapping = Mapping {
    table: "texte_by_titrefull_s",
    create: "
        CREATE TEMP TABLE texte_by_titrefull_s AS
            SELECT titrefull_s, min(texte_id) AS texte_id
              FROM textes_versions
             WHERE titrefull_s IS NOT NULL
               AND texte_id IS NOT NULL
          GROUP BY titrefull_s
            HAVING min(texte_id) = max(texte_id)",
    index: "CREATE UNIQUE INDEX temp.texte_by_titrefull_s_index ON texte_by_titrefull_s (titrefull_s)",
    size: "SELECT count(*) FROM temp.texte_by_titrefull_s",
    apply: "
        UPDATE textes_versions
           SET texte_id = (
                   SELECT m.texte_id
                     FROM temp.texte_by_titrefull_s m
                    WHERE m.titrefull_s = textes_versions.titrefull_s
               )
         WHERE texte_id IS NULL
           AND EXISTS (
                   SELECT 1
                     FROM temp.texte_by_titrefull_s m
                    WHERE m.titrefull_s = textes_versions.titrefull_s
               )",
    drop: "DROP TABLE IF EXISTS temp.texte_by_titrefull_s",
};

/// Link unlinked versions to the `textes` row holding the same key value.
pub fn attach_to_canonical<S: Store>(store: &S, key: IdentityKey) -> Result<usize> {
    let sql = match key {
        IdentityKey::NatureNum => ATTACH_BY_NATURE_NUM,
        IdentityKey::Nor => ATTACH_BY_NOR,
        IdentityKey::TitrefullS => ATTACH_BY_TITREFULL_S,
    };
    store.run(sql, &[])
}

/// Link unlinked versions using `key`.
///
/// `(nature, num)` is authoritative in `textes`; `nor` and `titrefull_s` are
/// resolved through the versions that are already linked.
pub fn connect<S: Store>(store: &S, key: IdentityKey) -> Result<usize> {
    match key {
        IdentityKey::NatureNum => attach_to_canonical(store, key),
        IdentityKey::Nor => connect_through(store, &NOR_MAPPING),
        IdentityKey::TitrefullS => connect_through(store, &TITREFULL_S_MAPPING),
    }
}

fn connect_through<S: Store>(store: &S, mapping: &Mapping) -> Result<usize> {
    let _table = TempTable::create(store, mapping.table, mapping.create, mapping.drop)?;
    store.run(mapping.index, &[])?;
    let size = store.one::<i64>(mapping.size, &[])?.unwrap_or(0);
    debug!(table = mapping.table, entries = size, "lookup built");
    store.run(mapping.apply, &[])
}
