use catalogdb::collection::{append_to_array, inc, push, set, Review, Update};
use catalogdb::common::{SystemClock, Value};
use catalogdb::doc;
use catalogdb::errors::ErrorKind;
use catalogdb::filter::field;
use catalogdb_int_test::test_util::{cleanup, create_test_context, run_test};
use chrono::NaiveDate;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_update_missing_key_returns_none() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let before = catalog.all();
            let review = Review::new("U999", 4, "Good value")?;
            let result = catalog.append_review(&field("product_id").eq("ELEC999"), &review, ctx.clock())?;
            assert!(result.is_none());
            assert_eq!(catalog.all(), before);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_append_review_keeps_earlier_reviews() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let filter = field("product_id").eq("ELEC002");
            let review = Review::new("U999", 4, "Good value")?.with_username("NewUser");

            let before = catalog.find_one(&filter)?.map(|doc| doc.get("reviews"));
            let after = catalog
                .append_review(&filter, &review, ctx.clock())?
                .map(|doc| doc.get("reviews"));

            let before = before.and_then(|value| value.as_array().cloned()).unwrap_or_default();
            let after = after.and_then(|value| value.as_array().cloned()).unwrap_or_default();
            assert_eq!(after.len(), before.len() + 1);
            assert_eq!(&after[..before.len()], &before[..]);
            assert_eq!(
                after.last().and_then(|review| review.as_document()).map(|review| review.get("date")),
                Some(Value::from("2024-03-15"))
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_append_review_creates_missing_array() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let review = Review::new("U100", 5, "Sturdy")?;
            let updated = catalog.append_review(&field("product_id").eq("HOME001"), &review, &SystemClock)?;
            let reviews = updated.map(|doc| doc.get("reviews")).unwrap_or(Value::Null);
            let reviews = reviews.as_array().cloned().unwrap_or_default();
            assert_eq!(reviews.len(), 1);

            let date = reviews[0]
                .as_document()
                .and_then(|review| review.get("date").as_string().cloned())
                .unwrap_or_default();
            assert!(NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_set_and_inc() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let filter = field("product_id").eq("BOOK002");

            let updated = catalog.update_one(&filter, &set("stock", 20).set("specifications.pages", 432))?;
            assert_eq!(
                updated,
                Some(doc!{
                    product_id: "BOOK002",
                    name: "Clean Architecture",
                    category: "Books",
                    price: 3200,
                    stock: 20,
                    specifications: { pages: 432 }
                })
            );

            let updated = catalog.update_one(&filter, &inc("stock", -5).inc("sold", 5))?;
            let updated = updated.unwrap_or_default();
            assert_eq!(updated.get("stock"), Value::from(15));
            assert_eq!(updated.get("sold"), Value::from(5));

            let updated = catalog.update_one(&filter, &inc("price", 0.5))?.unwrap_or_default();
            assert_eq!(updated.get("price"), Value::F64(3200.5));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_from_document() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let update = Update::from_document(&doc!{
                "$set": { stock: 0 },
                "$inc": { price: 100 }
            })?;
            let updated = catalog.update_one(&field("category").eq("Books"), &update)?;
            let updated = updated.unwrap_or_default();
            assert_eq!(updated.get("product_id"), Value::from("BOOK001"));
            assert_eq!(updated.get("stock"), Value::from(0));
            assert_eq!(updated.get("price"), Value::from(2600));

            let err = Update::from_document(&doc!{ "$unset": { stock: "" } }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::MalformedStage);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_update_leaves_document_unchanged() {
    run_test(
        create_test_context,
        |ctx| {
            let catalog = ctx.catalog();
            let filter = field("product_id").eq("ELEC001");
            let before = catalog.all();

            let err = catalog.update_one(&filter, &set("stock", 0).push("name", "x")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let err = catalog.update_one(&filter, &set("product_id", "ELEC100")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let err = catalog.update_one(&filter, &inc("name", 1)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let err = catalog.update_one(&filter, &set("price.amount", 1)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            assert_eq!(catalog.all(), before);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_append_to_array_on_detached_document() {
    run_test(
        create_test_context,
        |_ctx| {
            let product = doc!{ product_id: "X1", tags: ["a"] };
            let updated = append_to_array(&product, "tags", Value::from("b"))?;
            assert_eq!(updated.get("tags"), Value::from_vec(vec!["a", "b"]));
            assert_eq!(product.get("tags"), Value::from_vec(vec!["a"]));

            let err = append_to_array(&product, "product_id", Value::from("b")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            let updated = push("reviews", doc!{ rating: 5 }).apply(&product)?;
            assert_eq!(updated.get("reviews.rating"), Value::from_vec(vec![5]));
            Ok(())
        },
        cleanup,
    )
}
