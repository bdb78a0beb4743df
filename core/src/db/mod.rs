use sea_orm::{
    sea_query::{self, Expr, IntoIden, SimpleExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, InsertResult, Iterable,
    QueryFilter,
};

pub fn columns_contains<Col>(list: &[Col], c: &Col) -> bool {
    use std::mem::discriminant;
    list.iter().any(|l| discriminant(l) == discriminant(c))
}

pub struct DbOper {}
impl DbOper {
    /// `INSERT .. ON CONFLICT (conflict) DO UPDATE` every column except the
    /// conflict key and `exclude`.
    pub async fn upsert<Et, A, C>(
        db: &C,
        model: A,
        conflict: &[Et::Column],
        exclude: &[Et::Column],
    ) -> Result<InsertResult<A>, sea_orm::DbErr>
    where
        Et: EntityTrait,
        Et::Column: IntoIden + Copy,
        A: ActiveModelTrait<Entity = Et>,
        C: ConnectionTrait,
    {
        Et::insert(model)
            .on_conflict(
                sea_query::OnConflict::columns(conflict.iter().copied())
                    .update_columns(
                        Et::Column::iter()
                            .filter(|e| {
                                !columns_contains(conflict, e) && !columns_contains(exclude, e)
                            })
                            .collect::<Vec<_>>(),
                    )
                    .to_owned(),
            )
            .exec(db)
            .await
    }

    /// Store-level `SET col = col + 1`, never a read-modify-write.
    pub async fn increment<Et, C>(
        db: &C,
        counter: Et::Column,
        filter: SimpleExpr,
    ) -> Result<u64, sea_orm::DbErr>
    where
        Et: EntityTrait,
        Et::Column: ColumnTrait + Copy,
        C: ConnectionTrait,
    {
        let res = Et::update_many()
            .col_expr(counter, Expr::col(counter).add(1))
            .filter(filter)
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}
