//! Column and index helpers shared by the migrations.

use sea_orm_migration::prelude::*;

pub fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

pub fn status_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .string_len(16)
        .not_null()
        .default("ACTIVE")
        .to_owned()
}

pub fn created_at_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::cust("NOW()"))
        .to_owned()
}

pub async fn create_index<T: Iden + 'static>(
    manager: &SchemaManager<'_>,
    name: &str,
    table: T,
    col: T,
) -> Result<(), DbErr> {
    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(name)
                .table(table)
                .col(col)
                .to_owned(),
        )
        .await
}

/// Unique index over the event scope plus one natural key column.
pub async fn create_event_unique_index<T: Iden + Clone + 'static>(
    manager: &SchemaManager<'_>,
    name: &str,
    table: T,
    event_col: T,
    key_cols: &[T],
) -> Result<(), DbErr> {
    let mut index = Index::create();
    index.if_not_exists().name(name).table(table).col(event_col).unique();
    for col in key_cols {
        index.col(col.clone());
    }
    manager.create_index(index.to_owned()).await
}

pub async fn drop_table<T: Iden + 'static>(
    manager: &SchemaManager<'_>,
    table: T,
) -> Result<(), DbErr> {
    manager
        .drop_table(Table::drop().if_exists().table(table).to_owned())
        .await
}
