//! Binds a logical table (heading, declared keys, user indexes) to a
//! physical [`Recmap`] plus a set of [`Index`]es.
//!
//! Grounded on `original_source/duro/rel/stable.c`'s `RDB_create_stable`/
//! `RDB_open_stable`: compute the primary field layout from the heading and
//! its first declared key, read any further secondary indexes out of the
//! catalog, choose a collision-free physical storage name, and persist that
//! name before creating anything physical, so a crash between "chose a
//! name" and "created the recmap" is detectable (an orphaned
//! `sys_table_recmap` row pointing at a recmap that was never created) and
//! not a silent overwrite.

use std::collections::HashMap;

use catalog::{Catalog, Identifier, TableIndex};
use environment::Environment;
use error::{Error, ErrorKind, Result};
use field::{Comparator, FieldInfo};
use heading::{Heading, TableKey};
use recmap::{Recmap, RecmapFlags};
use rindex::{Index, IndexFlags};
use transaction::RecTransaction;

const MAX_NAME_SUFFIX: u32 = 999;

fn compute_layout(heading: &Heading, sort_order: Option<&TableKey>) -> (HashMap<String, usize>, Vec<FieldInfo>, usize) {
	let key = sort_order.unwrap_or_else(|| heading.primary_key());
	let mut attr_map = HashMap::new();
	for (i, name) in key.attrs.iter().enumerate() {
		attr_map.insert(name.clone(), i);
	}
	let mut next_no = key.attrs.len();
	for attr in &heading.attrs {
		attr_map.entry(attr.name.clone()).or_insert_with(|| {
			let n = next_no;
			next_no += 1;
			n
		});
	}
	let mut field_info: Vec<Option<FieldInfo>> = vec![None; heading.attrs.len()];
	for attr in &heading.attrs {
		let no = attr_map[&attr.name];
		field_info[no] = Some(match attr.len {
			Some(len) => FieldInfo::fixed(&attr.name, attr.flags, len),
			None => FieldInfo::variable(&attr.name, attr.flags),
		});
	}
	let field_info: Vec<FieldInfo> = field_info.into_iter().map(|f| f.expect("every field number in 0..field_count was assigned an attribute")).collect();
	(attr_map, field_info, key.attrs.len())
}

fn is_exists(err: &Error) -> bool {
	match *err.kind() {
		ErrorKind::Exists(_) => true,
		_ => false,
	}
}

fn create_physical_recmap(
	table_name: &str,
	env: &Environment,
	field_info: &[FieldInfo],
	key_field_count: usize,
	compare_fields: Option<Comparator>,
	ordered: bool,
	tx: &RecTransaction,
) -> Result<(String, Recmap)> {
	let flags = RecmapFlags { ordered: ordered, unique: true, delayed_deletion: true };
	match Recmap::create(Some(table_name), env, field_info.to_vec(), key_field_count, compare_fields.clone(), flags, tx) {
		Ok(rm) => return Ok((table_name.to_owned(), rm)),
		Err(ref e) if is_exists(e) => {}
		Err(e) => return Err(e),
	}
	for n in 1..=MAX_NAME_SUFFIX {
		let candidate = format!("{}{}", table_name, n);
		match Recmap::create(Some(&candidate), env, field_info.to_vec(), key_field_count, compare_fields.clone(), flags, tx) {
			Ok(rm) => return Ok((candidate, rm)),
			Err(ref e) if is_exists(e) => continue,
			Err(e) => return Err(e),
		}
	}
	Err(ErrorKind::Internal(format!("no available recmap storage name for table {}", table_name)).into())
}

/// A logical table bound to storage: one primary [`Recmap`] plus zero or
/// more secondary [`Index`]es.
pub struct StoredTable {
	name: Identifier,
	recmap: Recmap,
	attr_map: HashMap<String, usize>,
	indexes: Vec<Index>,
}

impl StoredTable {
	/// Creates physical storage for `table_name`: a primary recmap laid out
	/// from `heading` (ordered by `sort_order` if given, else by the
	/// heading's primary key), its catalog-declared secondary indexes, and
	/// a `sys_table_recmap` entry tying the logical name to the chosen
	/// physical one. Any partially-created storage is rolled back if a
	/// later step fails.
	pub fn create(table_name: &Identifier, heading: &Heading, env: &Environment, catalog: &Catalog, sort_order: Option<&TableKey>, tx: &RecTransaction) -> Result<StoredTable> {
		tx.ensure_active()?;
		let (attr_map, field_info, key_field_count) = compute_layout(heading, sort_order);
		let ordered = sort_order.is_some();
		let compare_fields = sort_order.map(|key| {
			let fields: Vec<(usize, bool)> = key.attrs.iter().zip(key.ascending.iter()).map(|(name, &asc)| (attr_map[name], asc)).collect();
			Comparator::new(fields)
		});

		let (recmap_name, recmap) = create_physical_recmap(table_name.as_str(), env, &field_info, key_field_count, compare_fields, ordered, tx)?;

		if let Err(e) = catalog.insert_table_recmap(table_name, &recmap_name, tx) {
			let _ = recmap.destroy_now(tx);
			return Err(e);
		}

		let declared = match catalog.get_indexes(table_name, tx) {
			Ok(v) => v,
			Err(e) => {
				let _ = recmap.destroy_now(tx);
				return Err(e);
			}
		};

		let mut indexes = Vec::with_capacity(declared.len());
		for ti in &declared {
			if let Err(e) = Self::build_one_index(ti, &attr_map, env, &recmap, &mut indexes, tx) {
				for idx in indexes {
					let _ = idx.delete(false, tx);
				}
				let _ = recmap.destroy_now(tx);
				return Err(e);
			}
		}

		Ok(StoredTable { name: table_name.clone(), recmap: recmap, attr_map: attr_map, indexes: indexes })
	}

	fn build_one_index(ti: &TableIndex, attr_map: &HashMap<String, usize>, env: &Environment, recmap: &Recmap, indexes: &mut Vec<Index>, tx: &RecTransaction) -> Result<()> {
		let mut field_nos = Vec::with_capacity(ti.attr_specs.len());
		for &(ref name, _) in &ti.attr_specs {
			let no = attr_map.get(name).cloned().ok_or(ErrorKind::Internal(format!("index {} references unknown attribute {}", ti.name, name)))?;
			field_nos.push(no);
		}
		let flags = IndexFlags { unique: ti.unique, ordered: ti.ordered };
		let compare_fields = if ti.ordered {
			let fields: Vec<(usize, bool)> = field_nos.iter().zip(ti.attr_specs.iter()).map(|(&no, &(_, asc))| (no, asc)).collect();
			Some(Comparator::new(fields))
		} else {
			None
		};
		let index = Index::create(recmap, Some(&ti.name), env, field_nos, compare_fields, flags, tx)?;
		indexes.push(index);
		Ok(())
	}

	/// Opens the already-created physical storage for `table_name`.
	pub fn open(table_name: &Identifier, heading: &Heading, env: &Environment, catalog: &Catalog, tx: &RecTransaction) -> Result<StoredTable> {
		tx.ensure_active()?;
		let recmap_name = catalog.recmap_name(table_name, tx)?;
		let (attr_map, field_info, key_field_count) = compute_layout(heading, None);
		let recmap = Recmap::open(&recmap_name, env, field_info, key_field_count, tx)?;
		let declared = catalog.get_indexes(table_name, tx)?;
		let mut indexes = Vec::with_capacity(declared.len());
		for ti in &declared {
			let field_nos: Vec<usize> = ti
				.attr_specs
				.iter()
				.map(|&(ref name, _)| attr_map.get(name).cloned().ok_or_else(|| Error::from(ErrorKind::Internal(format!("index {} references unknown attribute {}", ti.name, name)))))
				.collect::<Result<Vec<usize>>>()?;
			indexes.push(Index::open(&recmap, &ti.name, env, field_nos, tx)?);
		}
		Ok(StoredTable { name: table_name.clone(), recmap: recmap, attr_map: attr_map, indexes: indexes })
	}

	/// Opens `table_name`'s storage if it already exists, otherwise creates
	/// it.
	pub fn provide(table_name: &Identifier, heading: &Heading, env: &Environment, catalog: &Catalog, sort_order: Option<&TableKey>, tx: &RecTransaction) -> Result<StoredTable> {
		match Self::open(table_name, heading, env, catalog, tx) {
			Ok(st) => Ok(st),
			Err(ref e) if matches!(e.kind(), &ErrorKind::NotFound) => Self::create(table_name, heading, env, catalog, sort_order, tx),
			Err(e) => Err(e),
		}
	}

	/// The table's logical name.
	pub fn name(&self) -> &Identifier {
		&self.name
	}

	/// Looks up the physical field number an attribute was assigned.
	pub fn field_no(&self, attr: &str) -> Result<usize> {
		self.attr_map.get(attr).cloned().ok_or_else(|| ErrorKind::InvalidArgument(format!("no such attribute: {}", attr)).into())
	}

	/// The physical primary recmap.
	pub fn recmap(&self) -> &Recmap {
		&self.recmap
	}

	/// Live secondary index handles, in declaration order.
	pub fn indexes(&self) -> &[Index] {
		&self.indexes
	}

	/// Looks up a secondary index by name.
	pub fn index(&self, name: &str) -> Option<&Index> {
		self.indexes.iter().find(|i| i.name() == Some(name))
	}

	/// Catalog-shaped metadata for every index on this table, the implicit
	/// primary index (named `<table>$0`) first, followed by each declared
	/// secondary index.
	pub fn table_indexes(&self) -> Vec<TableIndex> {
		let mut out = Vec::with_capacity(self.indexes.len() + 1);
		out.push(TableIndex {
			name: format!("{}$0", self.name.as_str()),
			attr_specs: (0..self.recmap.key_field_count()).map(|no| (self.attr_name(no), true)).collect(),
			unique: self.recmap.is_unique(),
			ordered: self.recmap.is_ordered(),
		});
		for idx in &self.indexes {
			out.push(TableIndex {
				name: idx.name().unwrap_or("").to_owned(),
				attr_specs: idx.fields().iter().map(|&no| (self.attr_name(no), true)).collect(),
				unique: idx.is_unique(),
				ordered: idx.is_ordered(),
			});
		}
		out
	}

	fn attr_name(&self, no: usize) -> String {
		self.attr_map.iter().find(|&(_, &n)| n == no).map(|(name, _)| name.clone()).unwrap_or_default()
	}

	/// A driver-reported, possibly approximate, row count.
	pub fn estimated_size(&self, tx: &RecTransaction) -> Result<u64> {
		self.recmap.estimated_size(tx)
	}

	/// Closes the table's primary recmap and every secondary index without
	/// destroying their contents.
	pub fn close(self) -> Result<()> {
		for idx in self.indexes {
			idx.close()?;
		}
		self.recmap.close()
	}

	/// Schedules destruction of the table's physical storage (every
	/// secondary index, then the primary recmap) for when `tx` commits.
	pub fn delete(self, tx: &RecTransaction) -> Result<()> {
		tx.ensure_active()?;
		for idx in self.indexes {
			idx.delete(true, tx)?;
		}
		self.recmap.delete(tx)
	}
}
