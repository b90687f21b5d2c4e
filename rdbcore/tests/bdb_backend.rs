#[macro_use]
extern crate matches;
#[macro_use]
extern crate quickcheck;
extern crate env_logger;
extern crate rdbcore;
extern crate tempdir;

use std::collections::HashSet;
use std::sync::{Once, ONCE_INIT};

use tempdir::TempDir;

use rdbcore::backend::bdb::BdbOptions;
use rdbcore::{
	encode_object, Attribute, Catalog, Comparator, Environment, ErrorKind, Field, FieldFlags, FieldInfo, Heading, Identifier, Object, Recmap, RecmapFlags, SeekMode, StoredTable, TableKey,
};

static LOG_INIT: Once = ONCE_INIT;

/// Initialises the trace-level logger once per test binary, so a test run
/// with `RUST_LOG=rdbcore=trace` shows the create/delete lines the
/// environment emits (spec §6), instead of every test silently discarding
/// them.
fn init_logging() {
	LOG_INIT.call_once(|| {
		let _ = env_logger::init();
	});
}

fn open_env(dir: &TempDir) -> Environment {
	init_logging();
	let options = BdbOptions { base_dir: dir.path().to_str().unwrap().to_owned(), ..Default::default() };
	Environment::open_bdb(options).unwrap()
}

fn emp_heading() -> Heading {
	Heading::new(
		vec![
			Attribute::new("id", FieldFlags::INTEGER, Some(8)),
			Attribute::new("name", FieldFlags::CHAR, None),
			Attribute::new("dept", FieldFlags::CHAR, None),
		],
		vec![TableKey::new(vec!["id".to_owned()])],
	)
}

fn id_field(table: &StoredTable, value: i64) -> Field {
	Field::new(table.field_no("id").unwrap(), encode_object(&Object::Integer(value), &FieldInfo::fixed("id", FieldFlags::INTEGER, 8), true).unwrap())
}

fn name_field(table: &StoredTable, value: &str) -> Field {
	Field::new(table.field_no("name").unwrap(), encode_object(&Object::CharStr(value.to_owned()), &FieldInfo::variable("name", FieldFlags::CHAR), false).unwrap())
}

fn dept_field(table: &StoredTable, value: &str) -> Field {
	Field::new(table.field_no("dept").unwrap(), encode_object(&Object::CharStr(value.to_owned()), &FieldInfo::variable("dept", FieldFlags::CHAR), false).unwrap())
}

#[test]
fn table_create_and_roundtrip() {
	let dir = TempDir::new("rdbcore_create_roundtrip").unwrap();
	let env = open_env(&dir);
	let heading = emp_heading();
	let table_name = Identifier::new("emp").unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::bootstrap(&env, &tx).unwrap();
	let table = StoredTable::create(&table_name, &heading, &env, &catalog, None, &tx).unwrap();
	table.recmap().insert(&[id_field(&table, 1), name_field(&table, "alice"), dept_field(&table, "eng")], &tx).unwrap();
	table.close().unwrap();
	tx.commit().unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::open(&env, &tx).unwrap();
	let table = StoredTable::open(&table_name, &heading, &env, &catalog, &tx).unwrap();
	let key = id_field(&table, 1);
	let fields = table.recmap().get_fields(&[key], &[table.field_no("name").unwrap(), table.field_no("dept").unwrap()], &tx).unwrap();
	let name = fields.iter().find(|f| f.no == table.field_no("name").unwrap()).unwrap();
	assert_eq!(rdbcore::decode_object(&name.data, &FieldInfo::variable("name", FieldFlags::CHAR), false).unwrap(), Object::CharStr("alice".to_owned()));
	table.close().unwrap();
	tx.commit().unwrap();
}

#[test]
fn key_violation_on_duplicate_insert() {
	let dir = TempDir::new("rdbcore_key_violation").unwrap();
	let env = open_env(&dir);
	let heading = emp_heading();
	let table_name = Identifier::new("emp").unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::bootstrap(&env, &tx).unwrap();
	let table = StoredTable::create(&table_name, &heading, &env, &catalog, None, &tx).unwrap();
	table.recmap().insert(&[id_field(&table, 1), name_field(&table, "alice"), dept_field(&table, "eng")], &tx).unwrap();
	let second = table.recmap().insert(&[id_field(&table, 1), name_field(&table, "bob"), dept_field(&table, "sales")], &tx);
	assert!(matches!(second.unwrap_err().kind(), &ErrorKind::KeyViolation));
	table.close().unwrap();
	tx.commit().unwrap();
}

#[test]
fn secondary_index_lookup_and_update() {
	let dir = TempDir::new("rdbcore_secondary_index").unwrap();
	let env = open_env(&dir);
	let heading = emp_heading();
	let table_name = Identifier::new("emp").unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::bootstrap(&env, &tx).unwrap();
	catalog.insert_index("emp_by_name", &[("name".to_owned(), true)], true, false, &table_name, &tx).unwrap();
	let table = StoredTable::create(&table_name, &heading, &env, &catalog, None, &tx).unwrap();
	table.recmap().insert(&[id_field(&table, 1), name_field(&table, "alice"), dept_field(&table, "eng")], &tx).unwrap();

	let name_field_info = FieldInfo::variable("name", FieldFlags::CHAR);
	let lookup_key = Field::new(0, encode_object(&Object::CharStr("alice".to_owned()), &name_field_info, true).unwrap());
	let index = table.index("emp_by_name").unwrap();
	let found = index.get_fields(&[lookup_key.clone()], &[table.field_no("dept").unwrap()], &tx).unwrap();
	assert_eq!(found[0].data, dept_field(&table, "eng").data);

	table.recmap().update(&[id_field(&table, 1)], &[dept_field(&table, "research")], &tx).unwrap();
	let found = index.get_fields(&[lookup_key], &[table.field_no("dept").unwrap()], &tx).unwrap();
	assert_eq!(found[0].data, dept_field(&table, "research").data);

	table.close().unwrap();
	tx.commit().unwrap();
}

#[test]
fn ordered_cursor_iterates_in_key_order() {
	let dir = TempDir::new("rdbcore_ordered_cursor").unwrap();
	let env = open_env(&dir);

	let field_info = vec![FieldInfo::fixed("id", FieldFlags::INTEGER, 8)];
	let comparator = Comparator::new(vec![(0, true)]);
	let flags = RecmapFlags { ordered: true, unique: true, delayed_deletion: false };

	let tx = env.begin().unwrap();
	let recmap = Recmap::create(Some("ordered_ids"), &env, field_info.clone(), 1, Some(comparator), flags, &tx).unwrap();
	for v in vec![30i64, 10, 20] {
		let key = Field::new(0, encode_object(&Object::Integer(v), &field_info[0], true).unwrap());
		recmap.insert(&[key], &tx).unwrap();
	}

	let mut cursor = recmap.cursor(false, &tx).unwrap();
	let mut seen = Vec::new();
	let mut positioned = cursor.first().unwrap();
	while positioned {
		let field = cursor.get(0).unwrap();
		match rdbcore::decode_object(&field.data, &field_info[0], true).unwrap() {
			Object::Integer(v) => seen.push(v),
			_ => panic!("expected an integer"),
		}
		positioned = cursor.next(false).unwrap();
	}
	cursor.close().unwrap();
	assert_eq!(seen, vec![10, 20, 30]);

	let key = Field::new(0, encode_object(&Object::Integer(20), &field_info[0], true).unwrap());
	let mut cursor = recmap.cursor(false, &tx).unwrap();
	assert!(cursor.seek(&[key], SeekMode::Exact).unwrap());

	tx.commit().unwrap();
}

#[test]
fn nested_transaction_rollback_discards_inserts() {
	let dir = TempDir::new("rdbcore_nested_rollback").unwrap();
	let env = open_env(&dir);
	let heading = emp_heading();
	let table_name = Identifier::new("emp").unwrap();

	let outer = env.begin().unwrap();
	let catalog = Catalog::bootstrap(&env, &outer).unwrap();
	let table = StoredTable::create(&table_name, &heading, &env, &catalog, None, &outer).unwrap();
	table.recmap().insert(&[id_field(&table, 1), name_field(&table, "alice"), dept_field(&table, "eng")], &outer).unwrap();

	let inner = env.begin_nested(&outer).unwrap();
	table.recmap().insert(&[id_field(&table, 2), name_field(&table, "bob"), dept_field(&table, "sales")], &inner).unwrap();
	assert!(table.recmap().get_fields(&[id_field(&table, 2)], &[table.field_no("name").unwrap()], &inner).is_ok());
	inner.abort().unwrap();

	let missing = table.recmap().get_fields(&[id_field(&table, 2)], &[table.field_no("name").unwrap()], &outer);
	assert!(matches!(missing.unwrap_err().kind(), &ErrorKind::NotFound));
	let present = table.recmap().get_fields(&[id_field(&table, 1)], &[table.field_no("name").unwrap()], &outer).unwrap();
	assert_eq!(present[0].data, name_field(&table, "alice").data);

	table.close().unwrap();
	outer.commit().unwrap();
}

#[test]
fn deferred_table_deletion_survives_abort_and_applies_on_commit() {
	let dir = TempDir::new("rdbcore_deferred_deletion").unwrap();
	let env = open_env(&dir);
	let heading = emp_heading();
	let table_name = Identifier::new("emp").unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::bootstrap(&env, &tx).unwrap();
	let table = StoredTable::create(&table_name, &heading, &env, &catalog, None, &tx).unwrap();
	table.recmap().insert(&[id_field(&table, 1), name_field(&table, "alice"), dept_field(&table, "eng")], &tx).unwrap();
	table.close().unwrap();
	tx.commit().unwrap();

	// Scheduling deletion and then aborting must leave the table intact.
	let tx = env.begin().unwrap();
	let catalog = Catalog::open(&env, &tx).unwrap();
	let table = StoredTable::open(&table_name, &heading, &env, &catalog, &tx).unwrap();
	table.delete(&tx).unwrap();
	tx.abort().unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::open(&env, &tx).unwrap();
	let table = StoredTable::open(&table_name, &heading, &env, &catalog, &tx).unwrap();
	let rows = table.recmap().get_fields(&[id_field(&table, 1)], &[table.field_no("name").unwrap()], &tx).unwrap();
	assert_eq!(rows[0].data, name_field(&table, "alice").data);
	table.close().unwrap();
	tx.commit().unwrap();

	// Scheduling deletion and then committing must actually destroy storage.
	let tx = env.begin().unwrap();
	let catalog = Catalog::open(&env, &tx).unwrap();
	let table = StoredTable::open(&table_name, &heading, &env, &catalog, &tx).unwrap();
	table.delete(&tx).unwrap();
	tx.commit().unwrap();

	let tx = env.begin().unwrap();
	let catalog = Catalog::open(&env, &tx).unwrap();
	let reopened = StoredTable::open(&table_name, &heading, &env, &catalog, &tx);
	assert!(matches!(reopened.unwrap_err().kind(), &ErrorKind::NotFound));
	tx.commit().unwrap();
}

quickcheck! {
	// spec §8: on an ordered recmap with comparator C, `first` + `next*`
	// yields a sequence non-decreasing under C, for any insertion order.
	fn ordered_cursor_is_monotonic(raw: Vec<i32>) -> bool {
		let mut seen = HashSet::new();
		let insert_order: Vec<i64> = raw.into_iter().map(|v| v as i64).filter(|v| seen.insert(*v)).collect();
		if insert_order.is_empty() {
			return true;
		}

		let dir = TempDir::new("rdbcore_qc_ordered_cursor").unwrap();
		let env = open_env(&dir);
		let field_info = vec![FieldInfo::fixed("id", FieldFlags::INTEGER, 8)];
		let comparator = Comparator::new(vec![(0, true)]);
		let flags = RecmapFlags { ordered: true, unique: true, delayed_deletion: false };

		let tx = env.begin().unwrap();
		let recmap = Recmap::create(Some("qc_ordered"), &env, field_info.clone(), 1, Some(comparator), flags, &tx).unwrap();
		for v in &insert_order {
			let key = Field::new(0, encode_object(&Object::Integer(*v), &field_info[0], true).unwrap());
			recmap.insert(&[key], &tx).unwrap();
		}

		let mut seen_vals = Vec::new();
		let mut cursor = recmap.cursor(false, &tx).unwrap();
		let mut positioned = cursor.first().unwrap();
		while positioned {
			let field = cursor.get(0).unwrap();
			match rdbcore::decode_object(&field.data, &field_info[0], true).unwrap() {
				Object::Integer(v) => seen_vals.push(v),
				_ => return false,
			}
			positioned = cursor.next(false).unwrap();
		}
		cursor.close().unwrap();
		tx.commit().unwrap();

		let mut expected = insert_order;
		expected.sort();
		seen_vals == expected
	}
}
