use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, and inject a
/// tracked [`rocket::local::asynchronous::Client`] talking to a server with a
/// fresh, volatile ledger.
///
/// `#[backend_test(owner)]` connects the client as the ledger owner before
/// the test runs. `#[backend_test(admin)]` has the owner grant the example
/// admin its role, then connects as that admin.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let connect_as = |identity: TokenStream2| {
        quote! {
            {
                let response = rocket_client
                    .post(uri!(crate::api::auth::connect))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(crate::model::api::auth::ConnectRequest {
                        identity: #identity.to_string(),
                    }).to_string())
                    .dispatch()
                    .await;
                assert_eq!(response.status(), rocket::http::Status::Ok, "test login failed");
            }
        }
    };
    let connect_owner = connect_as(quote! { crate::model::common::Identity::owner_example() });
    let connect_admin = connect_as(quote! { crate::model::common::Identity::admin_example() });

    // Connect the client as owner/admin if needed.
    let arg = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg != "owner" && arg != "admin" => {
            return syn::Error::new(arg.span(), "Expected `owner` or `admin`")
                .into_compile_error()
                .into();
        }
        arg => arg,
    };
    let maybe_login = match arg {
        Some(arg) if arg == "owner" => connect_owner,
        Some(_) => quote! {
            #connect_owner
            {
                let response = rocket_client
                    .post(uri!(crate::api::accounts::add_admin))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(
                        crate::model::api::account::NewAccount::admin_example()
                    ).to_string())
                    .dispatch()
                    .await;
                assert_eq!(response.status(), rocket::http::Status::Ok, "test admin creation failed");
            }
            #connect_admin
        },
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> rocket::local::asynchronous::Client {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["dcast_backend"],
                    None,
                    None,
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::test_rocket())
                    .await
                    .unwrap();

                #maybe_login

                rocket_client
            }

            /// The test itself.
            #item_fn

            // Each test gets its own runtime, and so its own server.
            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                #[allow(unused_variables)]
                let rocket_client = setup().await;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if type_path
                    .path
                    .segments
                    .last()
                    .map_or(false, |segment| segment.ident == "Client")
                {
                    if !args.is_empty() {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                        ));
                    }
                    args.push(quote! { rocket_client });
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected `client_ident: Client`",
        ));
    }

    Ok(args)
}
