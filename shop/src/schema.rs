use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};

use crate::entities::{cart_item, category, discount, order, order_item, product, variant};

/// Create any missing tables from the entity definitions. Used by the
/// backend's `auto_migrate` flag and by the test harness; production
/// deployments with an existing schema leave the flag off.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let statements = vec![
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(variant::Entity),
        schema.create_table_from_entity(cart_item::Entity),
        schema.create_table_from_entity(discount::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
    ];
    for mut statement in statements {
        statement.if_not_exists();
        db.execute(backend.build(&statement)).await?;
    }
    Ok(())
}
