mod utils;

use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Runs a test inside a fresh `tether::testing::TestHarness`.
///
/// The test function takes the harness by reference and may return
/// `Result<(), tether::Failure>`. After the body returns, the harness shuts
/// its runtime down and fails the test with the first failure recorded
/// on any event loop.
///
/// ```rust,ignore
/// #[tether::test(worker_threads = 2)]
/// fn echo(harness: &TestHarness) -> Result<(), Failure> {
///     let server = NetServer::new(harness.handle());
///     // ...
///     harness.await_close(&server)
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut worker_threads: Option<String> = None;

    for arg in utils::split_args(attr) {
        match utils::parse_key_value(&arg) {
            Some((key, value)) if key == "worker_threads" => {
                if value.parse::<usize>().map_or(true, |n| n == 0) {
                    return utils::compile_error("worker_threads must be a positive integer");
                }
                worker_threads = Some(value);
            }
            _ => {
                let arg = utils::tokens_to_string(&arg);
                return utils::compile_error(&format!("unknown tether::test argument `{arg}`"));
            }
        }
    }

    let tokens: Vec<TokenTree> = item.into_iter().collect();

    if tokens
        .iter()
        .any(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        return utils::compile_error("#[tether::test] functions cannot be async");
    }

    let (Some(fn_pos), Some(body_pos)) = (utils::fn_keyword(&tokens), utils::last_brace_group(&tokens))
    else {
        return utils::compile_error("#[tether::test] expects a function");
    };

    let name = match tokens.get(fn_pos + 1) {
        Some(TokenTree::Ident(id)) => id.to_string(),
        _ => return utils::compile_error("#[tether::test] expects a named function"),
    };

    let params = match tokens.get(fn_pos + 2) {
        Some(TokenTree::Group(g)) if g.delimiter() == Delimiter::Parenthesis => {
            g.stream().to_string()
        }
        _ => return utils::compile_error("#[tether::test] does not support generic functions"),
    };

    let params = if params.trim().is_empty() {
        String::from("_: &::tether::testing::TestHarness")
    } else {
        params
    };

    let return_type = match tokens.get(fn_pos + 3..body_pos) {
        Some([TokenTree::Punct(dash), TokenTree::Punct(gt), rest @ ..])
            if dash.as_char() == '-' && gt.as_char() == '>' =>
        {
            Some(utils::tokens_to_string(rest))
        }
        _ => None,
    };

    let body = match &tokens[body_pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => return utils::compile_error("#[tether::test] expects a function body"),
    };

    let prefix = utils::tokens_to_string(&tokens[..fn_pos]);

    let mut builder = format!("::tether::testing::TestHarness::builder({name:?})");
    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }

    let run = match return_type {
        Some(ret) => format!(
            "let __body = |{params}| -> {ret} {{ {body} }};
            let __outcome = __body(&__harness);
            __harness.conclude(::core::result::Result::map_err(__outcome, ::core::convert::Into::into));"
        ),
        None => format!(
            "let __body = |{params}| {{ {body} }};
            __body(&__harness);
            __harness.finish();"
        ),
    };

    let output = format!(
        "#[test]
        {prefix} fn {name}() {{
            let __harness = {builder}
                .start()
                .unwrap_or_else(|err| ::core::panic!(\"failed to start test harness: {{}}\", err));
            {run}
        }}"
    );

    output
        .parse()
        .unwrap_or_else(|err| utils::compile_error(&format!("tether::test macro error: {err}")))
}
