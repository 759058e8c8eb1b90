use crate::analyze;
use alloy_primitives::{U256, keccak256};
use vyc_data::{
    CreationStrategy, Type,
    hir::{Contract, ExprKind, Stmt},
};
use vyc_syntax::{Diagnostic, DiagnosticKind, Result, parse_module};

fn check(source: &str) -> Result<Contract> {
    let module = parse_module(source).unwrap_or_else(|err| panic!("{}", err.render(source)));
    analyze(&module)
}

fn accepted(source: &str) -> Contract {
    check(source).unwrap_or_else(|err| panic!("{}", err.render(source)))
}

fn rejected(source: &str, kind: DiagnosticKind) -> Diagnostic {
    let err = check(source).expect_err("source should be rejected");
    assert_eq!(err.kind, kind, "{err}");
    err
}

fn function_body<'a>(contract: &'a Contract, name: &str) -> &'a [Stmt] {
    let function = contract.functions.iter().find(|f| f.name == name).expect("function exists");
    &function.body
}

const TOKEN: &str = r#"
struct Point:
    x: int128
    y: int128

event Moved:
    who: indexed(address)
    to: Point

LIMIT: constant(uint256) = 2 ** 3
owner: public(address)
points: public(HashMap[address, Point])
history: uint256[LIMIT]
NAME: public(immutable(String[16]))

@external
def __init__(name: String[16]):
    self.owner = msg.sender
    NAME = name

@external
def move(x: int128, y: int128):
    p: Point = Point({y: y, x: x})
    self.points[msg.sender] = p
    log Moved(msg.sender, p)

@view
@external
def total() -> uint256:
    s: uint256 = 0
    for i in range(LIMIT):
        s += self.history[i]
    return s
"#;

#[test]
fn declarations_and_layout() {
    let contract = accepted(TOKEN);

    let slots: Vec<(&str, u64)> =
        contract.storage.iter().map(|var| (var.name.as_str(), var.slot)).collect();
    assert_eq!(slots, [("owner", 0), ("points", 1), ("history", 2)]);
    assert_eq!(contract.storage.iter().last().unwrap().ty.storage_slots(), 8);
    assert_eq!(contract.immutables_size(), 64);

    let names: Vec<&str> = contract.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["owner", "points", "NAME", "__init__", "move", "total"]);
    let constructor = contract.constructor.expect("constructor");
    assert_eq!(contract.functions[constructor].name, "__init__");

    let points_getter = &contract.functions.iter().nth(1).unwrap();
    assert_eq!(points_getter.params.len(), 1);
    assert_eq!(points_getter.param_types().next(), Some(&Type::Address));
    assert!(matches!(points_getter.returns, Some(Type::Struct(_))));

    let moved = contract.events.iter().next().unwrap();
    assert_eq!(moved.topic0, keccak256("Moved(address,(int128,int128))"));
}

#[test]
fn struct_fields_in_declaration_order() {
    let contract = accepted(TOKEN);
    let Stmt::Assign { value, .. } = &function_body(&contract, "move")[0] else {
        panic!("expected assignment");
    };
    let ExprKind::Struct(fields) = &value.kind else { panic!("expected struct literal") };
    let ExprKind::Local(first) = fields[0].kind else { panic!("expected local") };
    let function = contract.functions.iter().find(|f| f.name == "move").unwrap();
    assert_eq!(first, function.params[0]);
}

#[test]
fn range_over_constant() {
    let contract = accepted(TOKEN);
    let Stmt::ForRange { bound, end, .. } = &function_body(&contract, "total")[1] else {
        panic!("expected range loop");
    };
    assert_eq!(*bound, 8);
    assert_eq!(end.as_literal(), Some(U256::from(8)));
}

#[test]
fn resolves_creation_builtins() {
    let contract = accepted(
        r#"
@external
def deploy(target: address) -> address:
    return create_from_factory(target, "hello!", 7, salt=keccak256("s"), value=1)

@external
def copy(target: address):
    create_copy_of(target, revert_on_failure=False)
"#,
    );
    let Stmt::Return(Some(value)) = &function_body(&contract, "deploy")[0] else {
        panic!("expected return");
    };
    let ExprKind::Create(call) = &value.kind else { panic!("expected creation call") };
    assert_eq!(call.strategy, CreationStrategy::FactoryForward);
    assert_eq!(call.args.len(), 2);
    assert_eq!(call.args[0].ty, Type::String(6));
    assert_eq!(call.args[1].ty, Type::UINT256);
    assert!(call.uses_create2());
    assert!(call.value.is_some());
    assert!(call.revert_on_failure);

    let Stmt::Expr(value) = &function_body(&contract, "copy")[0] else {
        panic!("expected expression statement");
    };
    let ExprKind::Create(call) = &value.kind else { panic!("expected creation call") };
    assert_eq!(call.strategy, CreationStrategy::RuntimeCopy);
    assert!(!call.uses_create2());
    assert!(!call.revert_on_failure);
}

#[test]
fn creation_argument_errors() {
    let wrap = |call: &str| format!("@external\ndef f(t: address) -> address:\n    return {call}\n");
    for call in [
        "create_minimal_proxy_to()",
        "create_minimal_proxy_to(t, t)",
        "create_copy_of(5)",
        "create_copy_of(t, code_offset=1)",
        "create_copy_of(t, salt=1)",
        "create_copy_of(t, revert_on_failure=(t == t))",
        "create_from_factory(t, gas=5)",
    ] {
        rejected(&wrap(call), DiagnosticKind::Argument);
    }
    let err = rejected(
        &wrap("create_minimal_proxy_to(0x12345678901234567890123456789012345678901a)"),
        DiagnosticKind::Syntax,
    );
    assert!(err.message.contains("40 hex digits"));
}

#[test]
fn view_functions_cannot_create() {
    let err = rejected(
        "@view\n@external\ndef f(t: address) -> address:\n    return create_copy_of(t)\n",
        DiagnosticKind::Structure,
    );
    assert!(err.message.contains("view"));
}

#[test]
fn undeclared_names() {
    rejected("@external\ndef f() -> uint256:\n    return y\n", DiagnosticKind::Structure);
    rejected("counter: uint256\n@external\ndef f():\n    counter = 1\n", DiagnosticKind::Structure);
    rejected("@external\ndef f():\n    self.missing = 1\n", DiagnosticKind::Structure);
}

#[test]
fn type_mismatches() {
    rejected("@external\ndef f():\n    x: bool = 1\n", DiagnosticKind::Type);
    rejected("@external\ndef f():\n    x: uint8 = 256\n", DiagnosticKind::Type);
    rejected("@external\ndef f():\n    x: int8 = -129\n", DiagnosticKind::Type);
    rejected("@external\ndef f():\n    x: String[3] = \"abcd\"\n", DiagnosticKind::Type);
    let source = "@external\ndef f(a: uint256, b: int256) -> bool:\n    return a < b\n";
    rejected(source, DiagnosticKind::Type);
    accepted("@external\ndef f():\n    x: int8 = -128\n    y: String[5] = \"abcd\"\n");
}

#[test]
fn constants_fold() {
    let contract = accepted(
        "X: constant(int128) = -2 ** 3\n@external\ndef f() -> int128:\n    return X * 2 + 3\n",
    );
    let Stmt::Return(Some(value)) = &contract.functions.iter().next().unwrap().body[0] else {
        panic!("expected return");
    };
    assert_eq!(value.as_literal(), Some(U256::from(13).wrapping_neg()));
}

#[test]
fn recursion_rejected() {
    let source = "@internal\ndef a():\n    self.b()\n\n@internal\ndef b():\n    self.a()\n";
    let err = rejected(source, DiagnosticKind::Structure);
    assert!(err.message.contains("recursive"));
}

#[test]
fn missing_return_rejected() {
    let source = "@external\ndef f(x: uint256) -> uint256:\n    if x > 1:\n        return 1\n";
    rejected(source, DiagnosticKind::Structure);
    accepted(
        "@external\ndef f(x: uint256) -> uint256:\n    if x > 1:\n        return 1\n    else:\n\
         \x20       raise \"small\"\n",
    );
}

#[test]
fn immutables_assigned_in_constructor_only() {
    let source = "X: immutable(uint256)\n@external\ndef __init__():\n    X = 1\n\
                  @external\ndef f():\n    X = 2\n";
    rejected(source, DiagnosticKind::Structure);
    let err = rejected("X: immutable(uint256)\n", DiagnosticKind::Structure);
    assert!(err.message.contains("never assigned"));
}

#[test]
fn mutability_rules() {
    rejected("@external\ndef f() -> uint256:\n    return msg.value\n", DiagnosticKind::Structure);
    accepted("@payable\n@external\ndef f() -> uint256:\n    return msg.value\n");
    rejected(
        "x: uint256\n@pure\n@external\ndef f() -> uint256:\n    return self.x\n",
        DiagnosticKind::Structure,
    );
    rejected("x: uint256\n@view\n@external\ndef f():\n    self.x = 1\n", DiagnosticKind::Structure);
    rejected(
        "@internal\ndef g():\n    pass\n@view\n@external\ndef f():\n    self.g()\n",
        DiagnosticKind::Structure,
    );
}

#[test]
fn range_needs_bound() {
    let err = rejected(
        "@external\ndef f(n: uint256):\n    for i in range(n):\n        pass\n",
        DiagnosticKind::Argument,
    );
    assert!(err.message.contains("bound"));
    accepted("@external\ndef f(n: uint256):\n    for i in range(n, bound=10):\n        pass\n");
}

#[test]
fn internal_call_defaults() {
    let contract = accepted(
        "@internal\ndef g(a: uint256, b: uint256 = 7) -> uint256:\n    return a + b\n\
         @external\ndef f() -> uint256:\n    return self.g(1)\n",
    );
    let Stmt::Return(Some(value)) = &function_body(&contract, "f")[0] else {
        panic!("expected return");
    };
    let ExprKind::Call(call) = &value.kind else { panic!("expected call") };
    assert_eq!(call.args.len(), 2);
    assert_eq!(call.args[1].as_literal(), Some(U256::from(7)));
    rejected(
        "@internal\ndef g(a: uint256) -> uint256:\n    return a\n\
         @external\ndef f() -> uint256:\n    return self.g(1, 2)\n",
        DiagnosticKind::Argument,
    );
}

#[test]
fn expression_statements_need_effects() {
    rejected("@external\ndef f(x: uint256):\n    x + 1\n", DiagnosticKind::Structure);
    rejected("@external\ndef f():\n    len(\"abc\")\n", DiagnosticKind::Structure);
}
