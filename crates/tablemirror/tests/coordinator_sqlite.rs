use std::thread;

use tablemirror::prelude::*;
use tablemirror::{CoordinatorConfig, QueryErrorKind, catalog};

struct Teams;

impl TableSchema for Teams {
    fn table_name(&self) -> &str {
        "teams"
    }

    fn ddl(&self) -> String {
        render_create_table(&[
            ColumnDefinition::new("id", ColumnType::Integer).primary_key(),
            ColumnDefinition::new("name", ColumnType::Text).not_null(),
            ColumnDefinition::new("headquarters", ColumnType::Text),
        ])
    }

    fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()> {
        columns.generated_key("id");
        Ok(())
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn seed_sql(&self) -> Option<String> {
        Some(
            "INSERT INTO {NS}.\"{NAME}\" (name, headquarters) VALUES \
             ('Preventers', 'Sharp Tower'), ('Z-Force', 'Sister Margaret''s Bar')"
                .to_string(),
        )
    }
}

struct Members;

impl TableSchema for Members {
    fn table_name(&self) -> &str {
        "members"
    }

    fn ddl(&self) -> String {
        render_create_table(&[
            ColumnDefinition::new("id", ColumnType::Integer).primary_key(),
            ColumnDefinition::new("code", ColumnType::Text).not_null(),
            ColumnDefinition::new("mentor", ColumnType::Text),
            ColumnDefinition::new("team_id", ColumnType::Integer).not_null(),
        ])
    }

    fn set_column_properties(&self, columns: &mut ColumnFlagsEditor<'_>) -> Result<()> {
        columns.generated_key("id");
        Ok(())
    }

    fn schema_version(&self) -> u32 {
        1
    }
}

fn open(store: &Store, schema: impl TableSchema) -> Table {
    let mut table = Table::new(store, schema);
    table.ensure_created().expect("create table");
    table
        .load(&LoadOptions::new().order_by("id"))
        .expect("load table");
    table
}

fn team(table: &Table, name: &str) -> RowHandle {
    table
        .find_row("name", &Value::from(name))
        .expect("team present")
}

#[test]
fn sqlite_two_table_save_is_atomic() {
    let store = Store::open_memory().expect("open store");
    let mut teams = open(&store, Teams);
    let mut members = open(&store, Members);
    let preventers = team(&teams, "Preventers");

    let mut coordinator = TransactionCoordinator::new(&store);
    let err = coordinator
        .save_tables(&mut [&mut teams, &mut members], |tx, tables| {
            tables[0].set_value(preventers, "headquarters", Value::from("Avengers Mansion"))?;
            tables[0].save_in(tx)?;
            // team_id is NOT NULL; the second table's write fails.
            tables[1].add_row(&[("code", Value::from("RM"))])?;
            tables[1].save_in(tx)?;
            Ok(())
        })
        .expect_err("second table must fail");

    assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    assert_eq!(
        teams.value(preventers, "headquarters").expect("hq"),
        &Value::from("Sharp Tower")
    );
    assert_eq!(teams.row_state(preventers).expect("state"), RowState::Unchanged);
    assert_eq!(members.row_count(), 0);
    assert_eq!(
        store
            .query_scalar("SELECT headquarters FROM teams WHERE name = 'Preventers'", &[])
            .expect("hq"),
        Value::from("Sharp Tower")
    );
    assert_eq!(catalog::row_count(&store, "main", "members").expect("count"), 0);
}

#[test]
fn sqlite_two_table_save_commits_both() {
    let store = Store::open_memory().expect("open store");
    let mut teams = open(&store, Teams);
    let mut members = open(&store, Members);
    let z_force = team(&teams, "Z-Force");

    let mut coordinator = TransactionCoordinator::new(&store);
    coordinator
        .save_tables(&mut [&mut teams, &mut members], |tx, tables| {
            tables[0].set_value(z_force, "headquarters", Value::Null)?;
            tables[0].save_in(tx)?;
            tables[1].add_row(&[("code", Value::from("DP")), ("team_id", Value::Integer(2))])?;
            tables[1].save_in(tx)?;
            Ok(())
        })
        .expect("commit");

    assert!(!teams.change_set().has_any());
    assert!(!members.change_set().has_any());
    let member = members.rows().next().expect("member");
    assert_eq!(members.value(member, "id").expect("id"), &Value::Integer(1));
    assert_eq!(
        store
            .query_scalar("SELECT headquarters FROM teams WHERE id = 2", &[])
            .expect("hq"),
        Value::Null
    );
    assert_eq!(coordinator.debug_state().committed, 1);
}

#[test]
fn sqlite_self_relation_revert_after_failure() {
    let store = Store::open_memory().expect("open store");
    let mut members = open(&store, Members);
    members
        .create_self_relation("mentorship", "code", "mentor", DeleteRule::Cascade)
        .expect("relation");
    members
        .create_child_to_parent_column("mentor_team", "mentorship", "team_id", None)
        .expect("lookup column");

    let mut coordinator = TransactionCoordinator::new(&store);
    let err = coordinator
        .save_tables(&mut [&mut members], |tx, tables| {
            let staff = &mut tables[0];
            staff.add_row(&[("code", Value::from("N")), ("team_id", Value::Integer(1))])?;
            let child = staff.add_row(&[
                ("code", Value::from("M")),
                ("mentor", Value::from("N")),
                ("team_id", Value::Integer(2)),
            ])?;
            assert_eq!(staff.value(child, "mentor_team")?, &Value::Integer(1));
            staff.save_in(tx)?;
            tx.execute("INSERT INTO missing_table VALUES (1)", &[])?;
            Ok(())
        })
        .expect_err("statement against a missing table");

    assert!(err.is_store_error());
    assert_eq!(members.row_count(), 0);
    assert!(members.enforce_constraints());
    assert_eq!(catalog::row_count(&store, "main", "members").expect("count"), 0);
}

#[test]
fn sqlite_self_relation_revert_without_relaxing_leaves_rows() {
    let store = Store::open_memory().expect("open store");
    let mut members = open(&store, Members);
    members
        .create_self_relation("mentorship", "code", "mentor", DeleteRule::SetNull)
        .expect("relation");

    let config = CoordinatorConfig {
        relax_self_relations_on_revert: false,
        ..CoordinatorConfig::default()
    };
    let mut coordinator = TransactionCoordinator::with_config(&store, config);
    let err = coordinator
        .save_tables(&mut [&mut members], |tx, tables| {
            tables[0].add_row(&[("code", Value::from("N")), ("team_id", Value::Integer(1))])?;
            tables[0].add_row(&[
                ("code", Value::from("M")),
                ("mentor", Value::from("N")),
                ("team_id", Value::Integer(1)),
            ])?;
            tables[0].save_in(tx)?;
            Err(Error::argument("abandon"))
        })
        .expect_err("callback failure");

    // The callback's error is reported, not the failed revert.
    assert!(matches!(err, Error::Argument(_)));
    assert_eq!(members.row_count(), 2);
    assert_eq!(catalog::row_count(&store, "main", "members").expect("count"), 0);
}

#[test]
fn sqlite_statement_list_is_all_or_nothing() {
    let store = Store::open_memory().expect("open store");
    let teams = open(&store, Teams);
    let mut coordinator = TransactionCoordinator::new(&store);

    let err = coordinator
        .execute_statements(&[
            "INSERT INTO teams (name) VALUES ('Avengers')",
            "INSERT INTO teams (name) VALUES (NULL)",
        ])
        .expect_err("NOT NULL");
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    assert_eq!(catalog::row_count(&store, "main", "teams").expect("count"), 2);

    let affected = coordinator
        .execute_statements(&["UPDATE teams SET headquarters = NULL"])
        .expect("update");
    assert_eq!(affected, 2);
    assert_eq!(teams.row_count(), 2);
}

#[test]
fn sqlite_concurrent_saves_serialize() {
    const ROUNDS: i64 = 25;

    let store = Store::open_memory().expect("open store");
    open(&store, Teams);

    thread::scope(|scope| {
        for name in ["Preventers", "Z-Force"] {
            let store = store.clone();
            scope.spawn(move || {
                let mut teams = open(&store, Teams);
                let row = team(&teams, name);
                for round in 1..=ROUNDS {
                    teams
                        .set_value(row, "headquarters", Value::from(format!("{name} #{round}")))
                        .expect("edit");
                    let summary = teams.save().expect("save");
                    assert_eq!(summary.updated, 1);
                }
            });
        }
    });

    for name in ["Preventers", "Z-Force"] {
        assert_eq!(
            store
                .query_scalar(
                    "SELECT headquarters FROM teams WHERE name = ?1",
                    &[Value::from(name)]
                )
                .expect("hq"),
            Value::from(format!("{name} #{ROUNDS}"))
        );
    }
    assert!(!store.in_transaction_on_this_thread());
}
