//! End-to-end pipeline scenarios (spec.md §8), driven entirely through the
//! public API with hand-built `ast::Module` values — the same style the
//! unit tests beside each stage use, since no parser is available to turn
//! source text into an `ast::Module` (spec.md §1: lexing/parsing is an
//! external collaborator's job).
//!
//! This crate has no VM interpreter (also out of scope per spec.md §1), so
//! a scenario's "calling the deployed contract returns/reverts" language is
//! tested here as the structural guarantee the compiler actually owns: the
//! dispatcher reaches the right selector, the right opcode is chosen for a
//! checked vs. unchecked operation, and the call-site memory layout matches
//! the ABI convention. Actual execution is the VM's contract to honor.

use std::sync::Arc;

use contractc::ast::{
    self, CallKind, EventParam, FunctionDecl, FunctionSigAnn, InterfaceDecl, Module, StateVarDecl,
    StorageClass, Stmt, TypeAnn,
};
use contractc::diagnostics::Span;
use contractc::types::{Mutability, Visibility};
use contractc::{codegen, ir_builder, layout, optimizer, resolver, types, CompilerConfig, ImportedSignatures};

fn s() -> Span {
    Span::new(0, 0, 1)
}

fn imported() -> Arc<ImportedSignatures> {
    Arc::new(ImportedSignatures::default())
}

/// Every `Opcode::Push` immediate this crate emits for a selector or ABI
/// word is written as a contiguous byte run by the finalizer's simple
/// length-prefixed encoding; a selector's 4 bytes therefore always appear
/// together somewhere in the finished byte string, regardless of internal
/// tag/length framing. Scanning for the literal run is enough to confirm
/// the dispatcher/call site carries it without coupling the test to the
/// exact opcode encoding.
fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// --- Scenario 1: identity function ---------------------------------------

#[test]
fn identity_function_dispatches_by_its_known_selector() {
    let mut module = Module::new("scenario1");
    module.functions.push(FunctionDecl {
        name: "identity".into(),
        params: vec![("x".into(), TypeAnn::UInt(256))],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::Pure,
        visibility: Visibility::External,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::Ident { name: "x".into(), span: s() }),
            span: s(),
        }],
        span: s(),
    });

    let config = CompilerConfig::default();
    let artifacts = contractc::compile_module(&module, &imported(), &config)
        .expect("identity(uint256) compiles");

    // spec.md §8 scenario 1: keccak("identity(uint256)")[0..4] == 0x8e8dbf82.
    let selector = [0x8e, 0x8d, 0xbf, 0x82];
    let abi_fn = artifacts.abi.function_by_selector(selector).expect("identity is in the ABI");
    assert_eq!(abi_fn.name, "identity");
    assert_eq!(artifacts.abi.entries.len(), 1, "only the one external function is exported");
    assert!(
        contains_bytes(&artifacts.runtime_bytecode, &selector),
        "dispatcher must compare against the selector's literal bytes somewhere in the runtime bytecode"
    );
}

// --- Scenario 2: checked vs. unchecked arithmetic -------------------------

/// Runs the pipeline up to (but not through) the finalizer, so the checked-
/// arithmetic lowering choice can be inspected as an `Opcode` rather than as
/// finalized bytes.
fn codegen_opcodes(module: &Module) -> Vec<contractc::opcode::Opcode> {
    let mut arena = types::TypeArena::new();
    let imported = ImportedSignatures::default();
    let (decls, decl_diagnostics) = resolver::collect_declarations(module, &mut arena, &imported);
    assert!(decl_diagnostics.is_empty(), "{:?}", decl_diagnostics.as_slice());

    let mut sink = contractc::diagnostics::DiagnosticSink::new();
    contractc::typechecker::check_module(module, &mut arena, &decls, &imported, &mut sink);
    assert!(!sink.has_errors(), "{:?}", sink.as_slice());

    let layout = layout::plan_layout(&module.state_vars, &decls, &arena, &mut sink);
    assert!(!sink.has_errors());

    let mut ir_module =
        ir_builder::build_module(module, &mut arena, &decls, &imported, &layout).expect("lowers to IR");
    let config = CompilerConfig::default();
    optimizer::optimize_module(&mut ir_module, &arena, &config);

    let output = codegen::generate(&ir_module, &decls, &module.events, &arena, &config)
        .expect("schedules and assembles");
    output.opcodes
}

fn add_function(name: &str, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.into(),
        params: vec![("a".into(), TypeAnn::UInt(256)), ("b".into(), TypeAnn::UInt(256))],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::Pure,
        visibility: Visibility::External,
        body,
        span: s(),
    }
}

fn sum_expr() -> ast::Expr {
    ast::Expr::Binary {
        op: ast::BinOp::Add,
        lhs: Box::new(ast::Expr::Ident { name: "a".into(), span: s() }),
        rhs: Box::new(ast::Expr::Ident { name: "b".into(), span: s() }),
        span: s(),
    }
}

#[test]
fn checked_by_default_add_lowers_to_the_overflow_checking_opcode() {
    let mut module = Module::new("scenario2_checked");
    module.functions.push(add_function(
        "add",
        vec![Stmt::Return { value: Some(sum_expr()), span: s() }],
    ));

    let opcodes = codegen_opcodes(&module);
    assert!(
        opcodes.iter().any(|op| matches!(op, contractc::opcode::Opcode::AddChecked)),
        "a+b outside any `unchecked` block must use the checked-arithmetic opcode (spec.md §4.4)"
    );
    assert!(!opcodes.iter().any(|op| matches!(op, contractc::opcode::Opcode::AddWrap)));
}

#[test]
fn unchecked_block_add_lowers_to_the_wrapping_opcode() {
    let mut module = Module::new("scenario2_unchecked");
    module.functions.push(add_function(
        "add",
        vec![Stmt::Unchecked {
            body: vec![Stmt::Return { value: Some(sum_expr()), span: s() }],
            span: s(),
        }],
    ));

    let opcodes = codegen_opcodes(&module);
    assert!(
        opcodes.iter().any(|op| matches!(op, contractc::opcode::Opcode::AddWrap)),
        "a+b inside an `unchecked` block must skip the overflow check (spec.md §4.4)"
    );
    assert!(!opcodes.iter().any(|op| matches!(op, contractc::opcode::Opcode::AddChecked)));
}

// --- Scenario 3: storage packing ------------------------------------------

#[test]
fn bool_and_uint248_pack_into_one_slot_at_the_expected_bit_offsets() {
    let mut module = Module::new("scenario3");
    module.state_vars.push(StateVarDecl {
        name: "flag".into(),
        ty: TypeAnn::Bool,
        class: StorageClass::Persistent,
        explicit_slot: None,
        packed: true,
        span: s(),
    });
    module.state_vars.push(StateVarDecl {
        name: "counter".into(),
        ty: TypeAnn::UInt(248),
        class: StorageClass::Persistent,
        explicit_slot: None,
        packed: true,
        span: s(),
    });

    let mut arena = types::TypeArena::new();
    let imported = ImportedSignatures::default();
    let (decls, decl_diagnostics) = resolver::collect_declarations(&module, &mut arena, &imported);
    assert!(decl_diagnostics.is_empty(), "{:?}", decl_diagnostics.as_slice());

    let mut sink = contractc::diagnostics::DiagnosticSink::new();
    let layout = layout::plan_layout(&module.state_vars, &decls, &arena, &mut sink);
    assert!(!sink.has_errors());

    let entries = layout::describe(&decls.state_vars, &layout, &arena);
    let flag = entries.iter().find(|e| e.name == "flag").unwrap();
    let counter = entries.iter().find(|e| e.name == "counter").unwrap();

    assert_eq!(flag.slot, 0);
    assert_eq!(flag.bit_offset, 0);
    assert_eq!(counter.slot, 0, "counter must share flag's slot, not start a new one");
    assert_eq!(counter.bit_offset, 8, "counter follows flag's 8-bit width");
}

// --- Scenario 4: nested mappings -----------------------------------------

#[test]
fn nested_mapping_module_compiles_and_swapped_keys_derive_distinct_slots() {
    let mut module = Module::new("scenario4");
    module.state_vars.push(StateVarDecl {
        name: "balances".into(),
        ty: TypeAnn::Mapping(
            Box::new(TypeAnn::Account),
            Box::new(TypeAnn::Mapping(Box::new(TypeAnn::Account), Box::new(TypeAnn::UInt(256)))),
        ),
        class: StorageClass::Persistent,
        explicit_slot: None,
        packed: false,
        span: s(),
    });

    module.functions.push(FunctionDecl {
        name: "set".into(),
        params: vec![
            ("a".into(), TypeAnn::Account),
            ("b".into(), TypeAnn::Account),
            ("v".into(), TypeAnn::UInt(256)),
        ],
        ret: None,
        mutability: Mutability::Nonpayable,
        visibility: Visibility::External,
        body: vec![Stmt::Assign {
            target: ast::Expr::Index {
                base: Box::new(ast::Expr::Index {
                    base: Box::new(ast::Expr::Ident { name: "balances".into(), span: s() }),
                    index: Box::new(ast::Expr::Ident { name: "a".into(), span: s() }),
                    span: s(),
                }),
                index: Box::new(ast::Expr::Ident { name: "b".into(), span: s() }),
                span: s(),
            },
            value: ast::Expr::Ident { name: "v".into(), span: s() },
            span: s(),
        }],
        span: s(),
    });
    module.functions.push(FunctionDecl {
        name: "get".into(),
        params: vec![("a".into(), TypeAnn::Account), ("b".into(), TypeAnn::Account)],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::View,
        visibility: Visibility::External,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::Index {
                base: Box::new(ast::Expr::Index {
                    base: Box::new(ast::Expr::Ident { name: "balances".into(), span: s() }),
                    index: Box::new(ast::Expr::Ident { name: "a".into(), span: s() }),
                    span: s(),
                }),
                index: Box::new(ast::Expr::Ident { name: "b".into(), span: s() }),
                span: s(),
            }),
            span: s(),
        }],
        span: s(),
    });
    let config = CompilerConfig::default();
    let artifacts =
        contractc::compile_module(&module, &imported(), &config).expect("nested mapping module compiles");
    assert_eq!(artifacts.abi.functions().count(), 2);

    // The compiler's actual guarantee (spec.md §8 scenario 4, restated without
    // a VM to execute `set`/`get` against): composing the keyed hash with
    // swapped key order must never collide, or `get(X, Y)` and `get(Y, X)`
    // would alias the same slot.
    let base_slot = 7u64;
    let x = [0xAA; 20];
    let y = [0xBB; 20];
    let slot_xy = layout::derive_mapping_slot(layout::derive_mapping_slot(base_slot, &x), &y);
    let slot_yx = layout::derive_mapping_slot(layout::derive_mapping_slot(base_slot, &y), &x);
    assert_ne!(slot_xy, slot_yx, "balances[X][Y] and balances[Y][X] must not alias");
}

// --- Scenario 5: external call ABI encoding --------------------------------

#[test]
fn external_call_memory_layout_begins_with_the_method_selector() {
    let mut module = Module::new("scenario5");
    module.interfaces.push(InterfaceDecl {
        name: "IErc20".into(),
        functions: vec![FunctionSigAnn {
            name: "transfer".into(),
            params: vec![("to".into(), TypeAnn::Account), ("amount".into(), TypeAnn::UInt(256))],
            ret: Some(TypeAnn::Bool),
            mutability: Mutability::Nonpayable,
        }],
        span: s(),
    });
    module.functions.push(FunctionDecl {
        name: "forward".into(),
        params: vec![
            ("token".into(), TypeAnn::Account),
            ("to".into(), TypeAnn::Account),
            ("amount".into(), TypeAnn::UInt(256)),
        ],
        ret: Some(TypeAnn::Bool),
        mutability: Mutability::Nonpayable,
        visibility: Visibility::External,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::ExternalCall {
                target: Box::new(ast::Expr::Ident { name: "token".into(), span: s() }),
                interface: "IErc20".into(),
                method: "transfer".into(),
                args: vec![
                    ast::Expr::Ident { name: "to".into(), span: s() },
                    ast::Expr::Ident { name: "amount".into(), span: s() },
                ],
                // A `transfer` is `nonpayable`, so it cannot be reached via
                // `Static` (spec.md §4.1's mutability lattice requires a
                // static call target be `pure`/`view`); `Plain` is the call
                // kind a real caller would use here. The ABI memory-layout
                // guarantee under test — selector first, then packed
                // arguments — is identical for all three `CallKind`s.
                kind: CallKind::Plain,
                span: s(),
            }),
            span: s(),
        }],
        span: s(),
    });

    let config = CompilerConfig::default();
    let artifacts =
        contractc::compile_module(&module, &imported(), &config).expect("external call module compiles");

    let selector = {
        use tiny_keccak::{Hasher, Keccak};
        let mut hasher = Keccak::v256();
        hasher.update(b"transfer(address,uint256)");
        let mut digest = [0u8; 32];
        hasher.finalize(&mut digest);
        [digest[0], digest[1], digest[2], digest[3]]
    };
    // Well-known real-world value for `transfer(address,uint256)`; kept as a
    // belt-and-braces cross-check on the freshly computed hash above.
    assert_eq!(selector, [0xa9, 0x05, 0x9c, 0xbb]);

    assert!(
        contains_bytes(&artifacts.runtime_bytecode, &selector),
        "the call site's ABI-encoded word must carry transfer's selector"
    );
}

// --- Scenario 6: dispatcher dead code for internal-only functions ---------

#[test]
fn internal_only_function_gets_no_dispatcher_entry() {
    let mut module = Module::new("scenario6");
    module.functions.push(FunctionDecl {
        name: "helper".into(),
        params: vec![("x".into(), TypeAnn::UInt(256))],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::Pure,
        visibility: Visibility::Internal,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::Ident { name: "x".into(), span: s() }),
            span: s(),
        }],
        span: s(),
    });
    module.functions.push(FunctionDecl {
        name: "callHelper".into(),
        params: vec![("x".into(), TypeAnn::UInt(256))],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::Pure,
        visibility: Visibility::External,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::Call {
                callee: "helper".into(),
                args: vec![ast::Expr::Ident { name: "x".into(), span: s() }],
                span: s(),
            }),
            span: s(),
        }],
        span: s(),
    });

    let config = CompilerConfig::default();
    let artifacts =
        contractc::compile_module(&module, &imported(), &config).expect("internal helper module compiles");

    assert!(artifacts.abi.functions().any(|f| f.name == "callHelper"));
    assert!(
        !artifacts.abi.functions().any(|f| f.name == "helper"),
        "an internal-only function must not be an ABI/dispatcher entry"
    );
    assert_eq!(artifacts.abi.entries.len(), 1);
}

// --- Determinism (spec.md §8 invariant) -----------------------------------

#[test]
fn compiling_the_same_module_twice_is_byte_identical() {
    let mut module = Module::new("scenario_determinism");
    module.events.push(ast::EventDecl {
        name: "Transfer".into(),
        params: vec![
            EventParam { name: "from".into(), ty: TypeAnn::Account, indexed: true },
            EventParam { name: "amount".into(), ty: TypeAnn::UInt(256), indexed: false },
        ],
        anonymous: false,
        span: s(),
    });
    module.functions.push(FunctionDecl {
        name: "identity".into(),
        params: vec![("x".into(), TypeAnn::UInt(256))],
        ret: Some(TypeAnn::UInt(256)),
        mutability: Mutability::Pure,
        visibility: Visibility::External,
        body: vec![Stmt::Return {
            value: Some(ast::Expr::Ident { name: "x".into(), span: s() }),
            span: s(),
        }],
        span: s(),
    });

    let config = CompilerConfig::default();
    let first = contractc::compile_module(&module, &imported(), &config).unwrap();
    let second = contractc::compile_module(&module, &imported(), &config).unwrap();

    assert_eq!(first.deploy_bytecode, second.deploy_bytecode);
    assert_eq!(first.runtime_bytecode, second.runtime_bytecode);
}
