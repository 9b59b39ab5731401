//! The full linking run, in order:
//!   1. schema (textes, textes_versions.texte_id)
//!   2. connect by (nature, num)
//!   3. insert by (nature, num), attach
//!   4. connect by nor
//!   5. connect by titrefull_s
//!   6. insert by nor, attach
//!   7. factorize by titrefull_s, connect by titrefull_s
//!   8. insert by titrefull_s, attach
//!   9. verify; clear nor and titrefull_s from textes when all linked
//!  10. delete textes nothing points at
//!
//! Later steps rely on earlier ones having linked all they could.

use tracing::{info, warn};

use crate::connect::{attach_to_canonical, connect};
use crate::db::{count_unlinked, ensure_schema, Store};
use crate::error::Result;
use crate::factorize::factorize;
use crate::insert::insert_missing;
use crate::keys::{IdentityKey, MergeKey};
use crate::report::{Outcome, RunReport, StepTracker};

const CLEAR_TRANSIENT_KEYS: &str = "
    UPDATE textes
       SET nor = NULL, titrefull_s = NULL
     WHERE nor IS NOT NULL
        OR titrefull_s IS NOT NULL";

const DELETE_UNREFERENCED: &str = "
    DELETE FROM textes
     WHERE NOT EXISTS (
               SELECT 1
                 FROM textes_versions v
                WHERE v.texte_id = textes.id
           )";

pub fn run<S: Store>(store: &S) -> Result<RunReport> {
    let mut tracker = StepTracker::new();

    let schema = ensure_schema(store)?;
    info!(?schema, "schema ready");

    connect_step(store, &mut tracker, IdentityKey::NatureNum)?;
    insert_step(store, &mut tracker, IdentityKey::NatureNum)?;

    connect_step(store, &mut tracker, IdentityKey::Nor)?;
    connect_step(store, &mut tracker, IdentityKey::TitrefullS)?;
    insert_step(store, &mut tracker, IdentityKey::Nor)?;

    let factorized = factorize(store, MergeKey::TitrefullS)?;
    info!(
        duplicates = factorized.absorbed,
        uniques = factorized.groups,
        "factorized by titrefull_s"
    );
    tracker.record("factorize by titrefull_s", factorized.repointed);
    connect_step(store, &mut tracker, IdentityKey::TitrefullS)?;

    insert_step(store, &mut tracker, IdentityKey::TitrefullS)?;

    let remaining = count_unlinked(store)?;
    let outcome = if remaining == 0 {
        let cleared = store.run(CLEAR_TRANSIENT_KEYS, &[])?;
        tracker.record("clear nor and titrefull_s", cleared);
        Outcome::Complete
    } else {
        warn!(remaining, "rows of textes_versions haven't been connected");
        Outcome::Unresolved { remaining }
    };

    let deleted = store.run(DELETE_UNREFERENCED, &[])?;
    tracker.record("delete unreferenced textes", deleted);

    Ok(tracker.finish(schema, factorized, deleted, outcome))
}

fn connect_step<S: Store>(store: &S, tracker: &mut StepTracker, key: IdentityKey) -> Result<usize> {
    let n = connect(store, key)?;
    Ok(tracker.record(format!("connect by {}", key), n))
}

/// Insert the missing canonical rows for `key`, then link versions to them.
fn insert_step<S: Store>(store: &S, tracker: &mut StepTracker, key: IdentityKey) -> Result<usize> {
    let inserted = insert_missing(store, key)?;
    tracker.record(format!("insert textes by {}", key), inserted);
    let attached = attach_to_canonical(store, key)?;
    Ok(tracker.record(format!("attach to new textes by {}", key), attached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Session;
    use crate::fixtures::{self, count, texte_ids};

    #[test]
    fn same_nature_num_share_one_new_texte() {
        let mut conn = fixtures::versions_db(&[
            (Some("LOI"), Some("123"), None, None),
            (Some("LOI"), Some("123"), None, None),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        assert_eq!(report.outcome, Outcome::Complete);
        assert_eq!(report.rows_for("insert textes by (nature, num)"), Some(1));
        assert_eq!(report.rows_for("attach to new textes by (nature, num)"), Some(2));
        let ids = texte_ids(&conn);
        assert!(ids[0].is_some());
        assert_eq!(ids[0], ids[1]);
        assert_eq!(count(&conn, "SELECT count(*) FROM textes"), 1);
    }

    #[test]
    fn empty_version_stays_unlinked_without_failing() {
        let mut conn = fixtures::versions_db(&[
            (None, None, None, None),
            (Some("LOI"), Some("1"), None, Some("loi-1")),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        assert_eq!(report.outcome, Outcome::Unresolved { remaining: 1 });
        assert_eq!(report.rows_for("clear nor and titrefull_s"), None);
        assert_eq!(texte_ids(&conn)[0], None);
        assert!(texte_ids(&conn)[1].is_some());
    }

    #[test]
    fn shared_title_across_natures() {
        let mut conn = fixtures::versions_db(&[
            (Some("A"), None, None, Some("foo")),
            (Some("A"), None, None, Some("foo")),
            (Some("B"), None, None, Some("foo")),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        // nothing was linked before factorization, so only the catch-all applies
        assert_eq!(report.factorized.groups, 0);
        assert_eq!(report.outcome, Outcome::Complete);
        let ids = texte_ids(&conn);
        assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));
    }

    #[test]
    fn title_duplicates_of_one_nature_are_merged() {
        // two versions of the same arrêté were published under different nums
        let mut conn = fixtures::versions_db(&[
            (Some("ARRETE"), Some("1"), None, Some("arrete-relatif")),
            (Some("ARRETE"), Some("2"), None, Some("arrete-relatif")),
            (Some("DECRET"), Some("3"), None, Some("arrete-relatif")),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        // the DECRET keeps the title group mixed, so no merge happens
        assert_eq!(report.factorized.groups, 0);
        let ids = texte_ids(&conn);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);

        let mut conn = fixtures::versions_db(&[
            (Some("ARRETE"), Some("1"), None, Some("arrete-relatif")),
            (Some("ARRETE"), Some("2"), None, Some("arrete-relatif")),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        assert_eq!(report.factorized.groups, 1);
        assert_eq!(report.factorized.repointed, 2);
        // both (nature, num) rows were absorbed and cleaned up
        assert_eq!(report.deleted, 2);
        let ids = texte_ids(&conn);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(count(&conn, "SELECT count(*) FROM textes"), 1);
    }

    #[test]
    fn sample_dump_end_to_end() {
        let mut conn = fixtures::versions_db(&[]);
        fixtures::load(&conn, "legi_sample");
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        assert_eq!(report.outcome, Outcome::Unresolved { remaining: 1 });
        let ids = texte_ids(&conn);
        // loi 2016-1321, including the version only known by nor
        assert!(ids[0].is_some());
        assert!(ids[1..4].iter().all(|id| *id == ids[0]));
        // arrêté by nor
        assert!(ids[4].is_some());
        assert_eq!(ids[4], ids[5]);
        // décret by title
        assert!(ids[6].is_some());
        assert_eq!(ids[6], ids[7]);
        assert_eq!(ids[8], None);

        assert_eq!(count(&conn, "SELECT count(*) FROM textes"), 3);
        assert_eq!(
            count(
                &conn,
                "SELECT count(*) FROM textes t WHERE NOT EXISTS (SELECT 1 FROM textes_versions v WHERE v.texte_id = t.id)"
            ),
            0
        );
    }

    #[test]
    fn complete_run_clears_transient_keys() {
        let mut conn = fixtures::versions_db(&[
            (Some("ARRETE"), None, Some("AGRG1712345A"), Some("arrete-a")),
            (Some("DECRET"), None, None, Some("decret-b")),
        ]);
        let session = Session::begin(&mut conn).unwrap();
        let report = run(&session).unwrap();
        session.commit().unwrap();

        assert_eq!(report.outcome, Outcome::Complete);
        assert_eq!(report.rows_for("clear nor and titrefull_s"), Some(2));
        assert_eq!(
            count(
                &conn,
                "SELECT count(*) FROM textes WHERE nor IS NOT NULL OR titrefull_s IS NOT NULL"
            ),
            0
        );
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut conn = fixtures::versions_db(&[]);
        fixtures::load(&conn, "legi_sample");
        conn.execute("DELETE FROM textes_versions WHERE nature IS NULL", [])
            .unwrap();

        let session = Session::begin(&mut conn).unwrap();
        let first = run(&session).unwrap();
        session.commit().unwrap();
        assert_eq!(first.outcome, Outcome::Complete);
        assert!(first.total_changes() > 0);
        let after_first = texte_ids(&conn);

        let session = Session::begin(&mut conn).unwrap();
        let second = run(&session).unwrap();
        session.commit().unwrap();
        assert_eq!(second.total_changes(), 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(texte_ids(&conn), after_first);
    }

    #[test]
    fn text_with_two_titles_is_merged_in_one_run() {
        let mut conn = fixtures::versions_db(&[
            (Some("A"), Some("1"), None, Some("t1")),
            (Some("A"), Some("2"), None, Some("t1")),
            (Some("A"), Some("2"), None, Some("t2")),
            (Some("A"), Some("3"), None, Some("t2")),
        ]);

        let session = Session::begin(&mut conn).unwrap();
        let first = run(&session).unwrap();
        session.commit().unwrap();
        assert_eq!(first.outcome, Outcome::Complete);
        assert_eq!(first.factorized.groups, 2);
        let ids = texte_ids(&conn);
        assert!(ids[0].is_some());
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(count(&conn, "SELECT count(*) FROM textes"), 1);

        let session = Session::begin(&mut conn).unwrap();
        let second = run(&session).unwrap();
        session.commit().unwrap();
        assert_eq!(second.total_changes(), 0);
        assert_eq!(texte_ids(&conn), ids);
    }

    #[test]
    fn rolled_back_run_leaves_no_trace() {
        let mut conn = fixtures::versions_db(&[(Some("LOI"), Some("1"), None, None)]);
        let session = Session::begin(&mut conn).unwrap();
        run(&session).unwrap();
        session.rollback().unwrap();

        assert_eq!(
            count(&conn, "SELECT count(*) FROM sqlite_master WHERE name = 'textes'"),
            0
        );
        assert_eq!(
            count(
                &conn,
                "SELECT count(*) FROM pragma_table_info('textes_versions') WHERE name = 'texte_id'"
            ),
            0
        );
    }
}
