#![forbid(unsafe_code)]

mod core;
mod indexes;
mod item_types;
mod records;
mod relations;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(item_types::SQL);
    sql.push_str(records::SQL);
    sql.push_str(relations::SQL);
    sql.push_str(indexes::SQL);
    sql
}
