//! Inserting: one new `textes` row per key value still unlinked.
//!
//! Rows are only created for a populated `nature` (the column is NOT NULL),
//! and never for a key value some `textes` row already carries.

use crate::db::Store;
use crate::error::Result;
use crate::keys::IdentityKey;

const INSERT_BY_NATURE_NUM: &str = "
    INSERT INTO textes (nature, num)
         SELECT nature, num
           FROM textes_versions v
          WHERE texte_id IS NULL
            AND nature IS NOT NULL
            AND num IS NOT NULL
            AND NOT EXISTS (
                    SELECT 1 FROM textes t WHERE t.nature = v.nature AND t.num = v.num
                )
       GROUP BY nature, num";

// Only nor groups consistent on nature and title get a row of their own.
const INSERT_BY_NOR: &str = "
    INSERT INTO textes (nature, nor)
         SELECT min(nature), nor
           FROM textes_versions v
          WHERE texte_id IS NULL
            AND nor IS NOT NULL
            AND NOT EXISTS (SELECT 1 FROM textes t WHERE t.nor = v.nor)
       GROUP BY nor
         HAVING min(nature) = max(nature)
            AND min(titrefull_s) = max(titrefull_s)";

const INSERT_BY_TITREFULL_S: &str = "
    INSERT INTO textes (nature, titrefull_s)
         SELECT min(nature), titrefull_s
           FROM textes_versions v
          WHERE texte_id IS NULL
            AND titrefull_s IS NOT NULL
            AND nature IS NOT NULL
            AND NOT EXISTS (SELECT 1 FROM textes t WHERE t.titrefull_s = v.titrefull_s)
       GROUP BY titrefull_s";

/// Create the missing canonical rows for `key`; returns how many were inserted.
pub fn insert_missing<S: Store>(store: &S, key: IdentityKey) -> Result<usize> {
    let sql = match key {
        IdentityKey::NatureNum => INSERT_BY_NATURE_NUM,
        IdentityKey::Nor => INSERT_BY_NOR,
        IdentityKey::TitrefullS => INSERT_BY_TITREFULL_S,
    };
    store.run(sql, &[])
}
