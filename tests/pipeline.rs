//! End-to-end pipeline tests: write a small L0 source to a temp file, run it
//! through the public `l0c::compile` entry point, and check properties of
//! the generated LLVM IR text. Modeled on the teacher's black-box
//! `tests/*.rs` style, adapted to this crate's actual CLI contract (an `.ll`
//! text artifact, not a linked-and-run binary — L0 compilation stops at IR
//! generation, per spec).

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use l0c::CompileError;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn compile_source(src: &str) -> Result<String, CompileError> {
    let path = write_temp_source(src);
    let result = l0c::compile(vec![path.clone()]);
    let _ = std::fs::remove_file(&path);
    let outputs = result?;
    assert_eq!(outputs.len(), 1);
    Ok(outputs.into_iter().next().unwrap().1)
}

fn write_temp_source(src: &str) -> std::path::PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("l0c_test_{}_{id}.l0", std::process::id()));
    let mut f = std::fs::File::create(&path).expect("create temp source file");
    f.write_all(src.as_bytes()).expect("write temp source file");
    path
}

#[test]
fn while_loop_summing_compiles_to_loop_blocks() -> anyhow::Result<()> {
    let ir = compile_source(
        r#"
        fn main() -> I64 {
          s: mut I64 = 0; i: mut I64 = 1;
          while i <= 10: { s = s + i; i = i + 1; };
          return s;
        };
        "#,
    )?;

    assert!(ir.contains("define i64 @main"));
    assert!(ir.contains("while.header"));
    assert!(ir.contains("while.body"));
    assert!(ir.contains("while.exit"));
    Ok(())
}

#[test]
fn closure_capture_allocates_context_struct() -> anyhow::Result<()> {
    let ir = compile_source(
        r#"
        fn make_adder(n: I64) -> (I64) -> I64 {
          return $(x: I64) -> I64 { return x + n; };
        };
        fn main() -> I64 {
          add_five := make_adder(5);
          return add_five(2);
        };
        "#,
    )?;

    assert!(ir.contains("call ptr @malloc"));
    assert!(ir.contains("__closure"));
    Ok(())
}

#[test]
fn struct_instance_lowers_to_named_struct_and_geps() -> anyhow::Result<()> {
    let ir = compile_source(
        r#"
        struct Point { x: I64 = 0; y: I64 = 0; };
        fn main() -> I64 { p := Point{ x = 3; y = 4; }; return p.x + p.y; };
        "#,
    )?;

    assert!(ir.contains("%Point = type { i64, i64 }"));
    assert!(ir.contains("getelementptr"));
    Ok(())
}

#[test]
fn calling_a_function_typed_instance_field_through_dot_is_not_a_method_call() -> anyhow::Result<()> {
    // `cb` is a plain (non-`method`) struct field of function type, so
    // `b.cb(41)` must lower as an ordinary closure call through the loaded
    // field value, not as a static method dispatch.
    let ir = compile_source(
        r#"
        struct Box { cb: (I64) -> I64 = $(x: I64) -> I64 { return x + 1; }; };
        fn main() -> I64 {
          b := Box{};
          return b.cb(41);
        };
        "#,
    )?;

    assert!(ir.contains("%Box = type { %__closure }"));
    assert!(ir.contains("%__closure = type { ptr, ptr }"));
    Ok(())
}

#[test]
fn mutable_reference_narrowing_is_rejected() {
    let result = compile_source(r#"fn main() -> I64 { x: I64 = 5; r: &mut I64 = &x; return 0; };"#);

    match result {
        Err(CompileError::Semantic(_)) => {}
        other => panic!("expected a semantic error rejecting the reference qualifier, got {other:?}"),
    }
}

#[test]
fn malformed_source_is_a_lex_or_parse_error() {
    let result = compile_source("fn main( -> I64 { return 0; };");
    assert!(matches!(result, Err(CompileError::Lex(_)) | Err(CompileError::Parse(_))));
}
