use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{NewProduct, Product, UpdateProduct};
use super::repo::ProductRepo;
use crate::auth::authorize::{require_access, require_role};
use crate::auth::claims::{Claims, ROLE_ADMIN};
use crate::db::Transactor;
use crate::error::{Error, Result};
use crate::validate::{page_window, parse_id};

const ENTITY: &str = "product";

/// Adds a product owned by the caller. Any owner in `np` is ignored.
#[instrument(skip(tr, claims, np))]
pub async fn create<D: ProductRepo>(
    tr: &mut Transactor<D>,
    claims: &Claims,
    np: NewProduct,
    now: OffsetDateTime,
) -> Result<Product> {
    np.validate()?;

    let product = Product {
        id: Uuid::new_v4(),
        name: np.name,
        cost: np.cost,
        quantity: np.quantity,
        user_id: claims.subject(),
        date_created: now,
        date_updated: now,
    };

    let row = product.clone();
    tr.within_transaction(move |tx| {
        Box::pin(async move {
            D::insert_product(tx, &row)
                .await
                .map_err(|e| Error::persistence("insert product", e))
        })
    })
    .await?;

    info!(product_id = %product.id, user_id = %product.user_id, "product created");
    Ok(product)
}

/// Applies `up` over the stored product. Access is decided by the stored
/// owner, never by anything in the request.
#[instrument(skip(tr, claims, up))]
pub async fn update<D: ProductRepo>(
    tr: &mut Transactor<D>,
    claims: &Claims,
    id: &str,
    up: UpdateProduct,
    now: OffsetDateTime,
) -> Result<()> {
    let id = parse_id(id)?;
    up.validate()?;

    let mut product = fetch(tr, id).await?;
    require_access(claims, product.user_id)?;

    if let Some(name) = up.name {
        product.name = name;
    }
    if let Some(cost) = up.cost {
        product.cost = cost;
    }
    if let Some(quantity) = up.quantity {
        product.quantity = quantity;
    }
    product.validate()?;
    product.date_updated = now;

    tr.within_transaction(move |tx| {
        Box::pin(async move {
            let affected = D::update_product(tx, &product)
                .await
                .map_err(|e| Error::persistence("update product", e))?;
            if affected == 0 {
                return Err(Error::not_found(ENTITY, product.id));
            }
            Ok(())
        })
    })
    .await
}

/// ADMIN only. Deleting an id that does not exist succeeds.
#[instrument(skip(tr, claims))]
pub async fn delete<D: ProductRepo>(tr: &mut Transactor<D>, claims: &Claims, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    require_role(claims, &[ROLE_ADMIN])?;

    tr.within_transaction(move |tx| {
        Box::pin(async move {
            D::delete_product(tx, id)
                .await
                .map_err(|e| Error::persistence("delete product", e))?;
            Ok(())
        })
    })
    .await
}

#[instrument(skip(tr))]
pub async fn query<D: ProductRepo>(
    tr: &mut Transactor<D>,
    page: i64,
    rows: i64,
) -> Result<Vec<Product>> {
    let (offset, limit) = page_window(page, rows)?;
    D::list_products(tr, offset, limit)
        .await
        .map_err(|e| Error::persistence("list products", e))
}

#[instrument(skip(tr))]
pub async fn query_by_id<D: ProductRepo>(tr: &mut Transactor<D>, id: &str) -> Result<Product> {
    let id = parse_id(id)?;
    fetch(tr, id).await
}

#[instrument(skip(tr))]
pub async fn query_by_owner<D: ProductRepo>(
    tr: &mut Transactor<D>,
    user_id: &str,
) -> Result<Vec<Product>> {
    let user_id = parse_id(user_id)?;
    D::products_by_owner(tr, user_id)
        .await
        .map_err(|e| Error::persistence("select products by owner", e))
}

async fn fetch<D: ProductRepo>(tr: &mut Transactor<D>, id: Uuid) -> Result<Product> {
    D::product_by_id(tr, id)
        .await
        .map_err(|e| Error::persistence("select product", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::auth::claims::ROLE_USER;
    use crate::db::memory::MemoryDb;
    use crate::error::ErrorKind;
    use crate::users::{self, model::NewUser, repo::UserRepo};

    const NOW: OffsetDateTime = datetime!(2019-03-24 0:00 UTC);

    fn claims(sub: Uuid, role: &str) -> Claims {
        Claims::new(sub, [role], "sales-api", NOW, NOW + Duration::HOUR).expect("claims")
    }

    fn comic_books(owner: Option<Uuid>) -> NewProduct {
        NewProduct {
            name: "Comic Books".into(),
            cost: 10,
            quantity: 55,
            user_id: owner,
        }
    }

    #[tokio::test]
    async fn owner_comes_from_claims_not_input() {
        let mut tr = Transactor::root(MemoryDb::default());
        let a = claims(Uuid::new_v4(), ROLE_USER);

        let p = create(&mut tr, &a, comic_books(Some(Uuid::new_v4())), NOW)
            .await
            .expect("create");
        assert_eq!(p.user_id, a.subject());

        let got = query_by_id(&mut tr, &p.id.to_string()).await.expect("query");
        assert_eq!(got, p);
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_update() {
        let db = MemoryDb::default();
        let mut tr = Transactor::root(db.clone());
        let a = claims(Uuid::new_v4(), ROLE_USER);
        let b = claims(Uuid::new_v4(), ROLE_USER);
        let admin = claims(Uuid::new_v4(), ROLE_ADMIN);

        let p = create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        let id = p.id.to_string();
        let commits = db.commits();

        let up = UpdateProduct {
            name: Some("Stolen".into()),
            ..UpdateProduct::default()
        };
        let err = update(&mut tr, &b, &id, up.clone(), NOW).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(db.commits(), commits);

        update(&mut tr, &admin, &id, up, NOW).await.expect("admin update");
        let got = query_by_id(&mut tr, &id).await.expect("query");
        assert_eq!(got.name, "Stolen");
        assert_eq!(got.user_id, a.subject());
    }

    #[tokio::test]
    async fn partial_update_leaves_the_rest_alone() {
        let mut tr = Transactor::root(MemoryDb::default());
        let a = claims(Uuid::new_v4(), ROLE_USER);
        let p = create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        let later = NOW + Duration::DAY;

        let up = UpdateProduct {
            name: Some("X".into()),
            ..UpdateProduct::default()
        };
        update(&mut tr, &a, &p.id.to_string(), up, later).await.expect("update");

        let got = query_by_id(&mut tr, &p.id.to_string()).await.expect("query");
        assert_eq!(got.name, "X");
        assert_eq!(got.cost, p.cost);
        assert_eq!(got.quantity, p.quantity);
        assert_eq!(got.user_id, p.user_id);
        assert_eq!(got.date_created, NOW);
        assert_eq!(got.date_updated, later);
    }

    #[tokio::test]
    async fn update_of_missing_product_is_not_found() {
        let mut tr = Transactor::root(MemoryDb::default());
        let admin = claims(Uuid::new_v4(), ROLE_ADMIN);

        let err = update(&mut tr, &admin, &Uuid::new_v4().to_string(), UpdateProduct::default(), NOW)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = update(&mut tr, &admin, "42", UpdateProduct::default(), NOW)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }

    #[tokio::test]
    async fn delete_is_admin_only_and_idempotent() {
        let mut tr = Transactor::root(MemoryDb::default());
        let a = claims(Uuid::new_v4(), ROLE_USER);
        let admin = claims(Uuid::new_v4(), ROLE_ADMIN);
        let p = create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        let id = p.id.to_string();

        // the owner is not enough, and a missing id does not change that
        for target in [id.clone(), Uuid::new_v4().to_string()] {
            let err = delete(&mut tr, &a, &target).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        delete(&mut tr, &admin, &id).await.expect("first delete");
        delete(&mut tr, &admin, &id).await.expect("second delete");
        let err = query_by_id(&mut tr, &id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn pages_cover_both_rows_in_id_order() {
        let mut tr = Transactor::root(MemoryDb::default());
        let a = claims(Uuid::new_v4(), ROLE_USER);
        let p1 = create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        let p2 = create(&mut tr, &a, comic_books(None), NOW).await.expect("create");

        let first = query(&mut tr, 1, 1).await.expect("page 1");
        let second = query(&mut tr, 2, 1).await.expect("page 2");
        let mut ids = vec![p1.id, p2.id];
        ids.sort();
        assert_eq!(vec![first[0].id, second[0].id], ids);
        assert!(query(&mut tr, 3, 1).await.expect("page 3").is_empty());
    }

    #[tokio::test]
    async fn query_by_owner_filters() {
        let mut tr = Transactor::root(MemoryDb::default());
        let a = claims(Uuid::new_v4(), ROLE_USER);
        let b = claims(Uuid::new_v4(), ROLE_USER);
        create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        create(&mut tr, &a, comic_books(None), NOW).await.expect("create");
        create(&mut tr, &b, comic_books(None), NOW).await.expect("create");

        let mine = query_by_owner(&mut tr, &a.subject().to_string())
            .await
            .expect("by owner");
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.user_id == a.subject()));
    }

    // A user and their first product written as one unit across both stores.
    #[tokio::test]
    async fn stores_compose_inside_one_transaction() {
        let db = MemoryDb::default();
        let mut tr = Transactor::root(db.clone());
        let nu = NewUser {
            name: "Bill".into(),
            email: "bill@x.com".into(),
            roles: vec![ROLE_ADMIN.into()],
            password: "gophers".into(),
            password_confirm: "gophers".into(),
        };

        let err = tr
            .within_transaction(move |tx| {
                Box::pin(async move {
                    let bill = users::store::create(tx, nu, NOW).await?;
                    let owner = claims(bill.id, ROLE_USER);
                    create(tx, &owner, comic_books(None), NOW).await?;
                    // fails validation after both writes are staged
                    create(tx, &owner, NewProduct { cost: -1, ..comic_books(None) }, NOW).await
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(db.begins(), 1);
        assert_eq!(db.commits(), 0);

        let mut tr = Transactor::root(db.clone());
        assert!(MemoryDb::user_by_email(&mut tr, "bill@x.com")
            .await
            .expect("lookup")
            .is_none());
        assert!(query(&mut tr, 1, 10).await.expect("list").is_empty());
    }
}
