use catalogdb::collection::Document;
use catalogdb::common::{FixedClock, Value};
use catalogdb::doc;
use catalogdb::errors::{CatalogError, CatalogResult, ErrorKind};
use catalogdb::Catalog;
use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::time::Instant;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test fails, so it can check store
/// invariants that must hold after any sequence of operations.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> CatalogResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> CatalogResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> CatalogResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| {
                    (format!("After run failed: {:?}", e), backtrace.to_string())
                }),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((error, backtrace))) => (error, backtrace),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed. Error: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    catalog: Catalog,
    clock: FixedClock,
}

impl TestContext {
    pub fn new(catalog: Catalog, clock: FixedClock) -> Self {
        Self { catalog, clock }
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog.clone()
    }

    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }
}

/// Opens an empty catalog keyed by `product_id`.
pub fn create_empty_context() -> CatalogResult<TestContext> {
    let catalog = Catalog::builder().name("products").open()?;
    Ok(TestContext::new(catalog, test_clock()?))
}

/// Opens a catalog seeded with [sample_products].
pub fn create_test_context() -> CatalogResult<TestContext> {
    let ctx = create_empty_context()?;
    let products = sample_products();
    log::debug!("Seeding catalog with {} products", products.len());
    ctx.catalog().load(products)?;
    Ok(ctx)
}

/// Checks that every stored document still carries a unique, non-null key.
pub fn cleanup(ctx: TestContext) -> CatalogResult<()> {
    let catalog = ctx.catalog();
    let key_field = catalog.key_field().to_string();

    let mut keys = HashSet::new();
    for document in catalog.all() {
        let key = document.get(&key_field);
        if key.is_null() || !keys.insert(key.clone()) {
            log::error!("Store invariant broken for key {}", key);
            return Err(CatalogError::new(
                &format!("Store invariant broken for key {}", key),
                ErrorKind::InternalError,
            ));
        }
    }
    Ok(())
}

pub fn test_clock() -> CatalogResult<FixedClock> {
    FixedClock::from_ymd(2024, 3, 15)
        .ok_or_else(|| CatalogError::new("Invalid test date", ErrorKind::InternalError))
}

/// Six products over three categories. Electronics carry reviews, one book
/// has an empty review list and the rest have none.
pub fn sample_products() -> Vec<Document> {
    vec![
        doc!{
            product_id: "ELEC001",
            name: "Wireless Earbuds",
            category: "Electronics",
            price: 45000,
            stock: 120,
            specifications: { brand: "Sonic", battery_hours: 24 },
            reviews: [
                { user_id: "U001", username: "asha", rating: 5, comment: "Excellent sound", date: "2024-01-10" },
                { user_id: "U002", username: "ravi", rating: 3, comment: "Average fit", date: "2024-01-22" },
                { user_id: "U003", username: "meera", rating: 4, comment: "Good battery", date: "2024-02-03" }
            ]
        },
        doc!{
            product_id: "ELEC002",
            name: "Smart Watch",
            category: "Electronics",
            price: 60000,
            stock: 45,
            specifications: { brand: "Tick", battery_hours: 48 },
            reviews: [
                { user_id: "U004", username: "kabir", rating: 4, comment: "Solid", date: "2024-02-11" },
                { user_id: "U005", username: "nila", rating: 5, comment: "Love it", date: "2024-02-19" }
            ]
        },
        doc!{
            product_id: "ELEC003",
            name: "USB-C Cable",
            category: "Electronics",
            price: 1500,
            stock: 800,
            reviews: [
                { user_id: "U006", username: "dev", rating: 2, comment: "Stopped working", date: "2024-03-01" }
            ]
        },
        doc!{
            product_id: "BOOK001",
            name: "The Pragmatic Programmer",
            category: "Books",
            price: 2500,
            stock: 60,
            reviews: []
        },
        doc!{
            product_id: "BOOK002",
            name: "Clean Architecture",
            category: "Books",
            price: 3200,
            stock: 25
        },
        doc!{
            product_id: "HOME001",
            name: "Ceramic Mug",
            category: "Home",
            price: 800,
            stock: 300
        },
    ]
}

/// Collects one field of each document, in order.
pub fn field_values(documents: &[Document], field: &str) -> Vec<Value> {
    documents.iter().map(|document| document.get(field)).collect()
}
