use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that any test database is dropped regardless of how the test
/// terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::ledger::SharedLedger`. The client serves the same ledger that is
/// injected.
///
/// By default the ledger lives in memory. `#[backend_test(mongodb)]` runs the
/// test against a fresh MongoDB database instead, found at
/// `LEDGER_TEST_DB_URI`; such tests are ignored unless requested.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(&item_fn.sig) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Pick the ledger backend.
    let use_mongodb = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongodb" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `mongodb` or no argument")
                .into_compile_error()
                .into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let (maybe_ignore, open_ledger) = if use_mongodb {
        (
            quote! { #[ignore = "needs a MongoDB deployment at LEDGER_TEST_DB_URI"] },
            quote! {
                let db_uri = std::env::var("LEDGER_TEST_DB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
                let db_name = format!("test{}", rand::random::<u32>());
                let ledger = crate::ledger::MongoLedger::connect(&db_uri, &db_name)
                    .await
                    .unwrap();
                let db = Some(ledger.database().clone());
                let ledger: crate::ledger::SharedLedger = std::sync::Arc::new(ledger);
            },
        )
    } else {
        (
            quote! {},
            quote! {
                let db: Option<mongodb::Database> = None;
                let ledger = crate::ledger::MemoryLedger::shared();
            },
        )
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #maybe_ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::ledger::SharedLedger,
                Option<mongodb::Database>,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["ballot_ledger"],
                    None,
                    None,
                );

                #open_ledger

                let rocket = crate::rocket_for_ledger(ledger.clone(), Default::default());
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                (rocket_client, ledger, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`. The inner one has several workers so
            // tests can race tasks against each other.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, ledger, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let ledger_mutex = std::sync::Mutex::new(ledger);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let ledger = ledger_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject
/// unknown parameters.
fn check_sig(sig: &Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_ledger = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Accept both bare and qualified paths, e.g. `ledger::SharedLedger`.
                let type_ident = type_path.path.segments.last().map(|s| &s.ident);
                if let Some(type_ident) = type_ident {
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "SharedLedger" {
                        if has_ledger {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `SharedLedger`",
                            ));
                        }
                        has_ledger = true;
                        args.push(quote! { ledger.clone() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `ledger_ident: SharedLedger`",
        ));
    }

    Ok(args)
}
