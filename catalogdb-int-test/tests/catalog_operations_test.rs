// The five product-catalog operations, each written with stage and filter
// documents the way a shell script would issue them.
use catalogdb::aggregate::Pipeline;
use catalogdb::collection::{project, Projection, Update};
use catalogdb::common::Value;
use catalogdb::doc;
use catalogdb::filter::Filter;
use catalogdb_int_test::test_util::{cleanup, create_test_context, field_values, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_import_verification_counts_every_document() {
    run_test(
        create_test_context,
        |ctx| {
            assert_eq!(ctx.catalog().count_documents(None)?, 6);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_electronics_under_50000() {
    run_test(
        create_test_context,
        |ctx| {
            let filter = Filter::from_document(&doc!{
                category: "Electronics",
                price: { "$lt": 50000 }
            })?;
            let projection = Projection::from_document(&doc!{ _id: 0, name: 1, price: 1, stock: 1 })?;

            let result = ctx.catalog().find_with_options(&filter, &project(projection))?;
            assert_eq!(
                result,
                vec![
                    doc!{ name: "Wireless Earbuds", price: 45000, stock: 120 },
                    doc!{ name: "USB-C Cable", price: 1500, stock: 800 },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_products_rated_four_or_more() {
    run_test(
        create_test_context,
        |ctx| {
            let pipeline = Pipeline::from_documents(&[
                doc!{ "$project": {
                    product_id: 1,
                    name: 1,
                    category: 1,
                    avg_rating: { "$avg": "$reviews.rating" },
                    review_count: { "$size": { "$ifNull": ["$reviews", []] } }
                } },
                doc!{ "$match": {
                    avg_rating: { "$gte": 4.0 },
                    review_count: { "$gt": 0 }
                } },
                doc!{ "$project": {
                    _id: 0,
                    product_id: 1,
                    name: 1,
                    category: 1,
                    avg_rating: { "$round": ["$avg_rating", 2] },
                    review_count: 1
                } },
            ])?;

            let result = ctx.catalog().aggregate(&pipeline)?;
            assert_eq!(
                result,
                vec![
                    doc!{
                        product_id: "ELEC001",
                        name: "Wireless Earbuds",
                        category: "Electronics",
                        review_count: 3,
                        avg_rating: 4.0
                    },
                    doc!{
                        product_id: "ELEC002",
                        name: "Smart Watch",
                        category: "Electronics",
                        review_count: 2,
                        avg_rating: 4.5
                    },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_append_review_to_elec001() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let filter = Filter::from_document(&doc!{ product_id: "ELEC001" })?;
            let before = catalog.find_one(&filter)?.map(|doc| doc.get("reviews"));

            let update = Update::from_document(&doc!{
                "$push": {
                    reviews: {
                        user_id: "U999",
                        username: "NewUser",
                        rating: 4,
                        comment: "Good value",
                        date: "2024-03-15"
                    }
                }
            })?;
            let updated = catalog.update_one(&filter, &update)?;
            assert!(updated.is_some());

            let projection = Projection::from_document(&doc!{ _id: 0, product_id: 1, name: 1, reviews: 1 })?;
            let product = catalog.find_one_with_projection(&filter, &projection)?;
            let product = match product {
                Some(product) => product,
                None => panic!("ELEC001 should exist"),
            };

            assert_eq!(
                product.keys().map(|key| key.as_str()).collect::<Vec<_>>(),
                vec!["product_id", "name", "reviews"]
            );
            let reviews = product.get("reviews");
            let reviews = reviews.as_array().cloned().unwrap_or_default();
            assert_eq!(reviews.len(), 4);

            let earlier = before.and_then(|value| value.as_array().cloned()).unwrap_or_default();
            assert_eq!(&reviews[..3], &earlier[..]);
            assert_eq!(
                reviews[3],
                Value::Document(doc!{
                    user_id: "U999",
                    username: "NewUser",
                    rating: 4,
                    comment: "Good value",
                    date: "2024-03-15"
                })
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_average_price_by_category() {
    run_test(
        create_test_context,
        |ctx| {
            let pipeline = Pipeline::from_documents(&[
                doc!{ "$group": {
                    _id: "$category",
                    avg_price: { "$avg": "$price" },
                    product_count: { "$sum": 1 }
                } },
                doc!{ "$project": {
                    _id: 0,
                    category: "$_id",
                    avg_price: { "$round": ["$avg_price", 2] },
                    product_count: 1
                } },
                doc!{ "$sort": { avg_price: (-1) } },
            ])?;

            let result = ctx.catalog().aggregate(&pipeline)?;
            assert_eq!(
                field_values(&result, "category"),
                vec![Value::from("Electronics"), Value::from("Books"), Value::from("Home")]
            );
            assert_eq!(
                result,
                vec![
                    doc!{ product_count: 3, category: "Electronics", avg_price: 35500.0 },
                    doc!{ product_count: 2, category: "Books", avg_price: 2850.0 },
                    doc!{ product_count: 1, category: "Home", avg_price: 800.0 },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}
