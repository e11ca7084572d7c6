//! Full assemble-then-execute scenarios, exercising `hoil::assemble` and
//! `coil::vm::Vm` together the way `hoil2coil | coilvm` does on the command line.

use coil::vm::Vm;

fn run(source: &str) -> i64 {
    let records = hoil::assemble(source).expect("assembly should succeed");
    let mut bytes = Vec::new();
    hoil::write_binary(&records, &mut bytes).unwrap();
    let mut vm = Vm::load(&bytes).expect("load should succeed");
    vm.run().expect("execution should succeed")
}

#[test]
fn hello_via_syscall_write_exits_cleanly() {
    let source = "\
VAL DEFV int8 h 72
VAL DEFV int8 i 105
VAL DEFV int8 nl 10
CF SYSC 1 1 &h 3
CF EXIT 0
";
    assert_eq!(run(source), 0);
}

#[test]
fn fibonacci_via_loop_reaches_the_tenth_term() {
    let source = "\
VAL DEFV int64 a 0
VAL DEFV int64 b 1
VAL DEFV int64 i 0
VAL DEFV int64 n 10
VAL DEFV int64 one 1
CF LABEL loop
CF JCOND GE i n end
MATH ADD t a b
VAL MOVV int64 a b
VAL MOVV int64 b t
MATH ADD i i one
CF JMP loop
CF LABEL end
CF EXIT a
";
    assert_eq!(run(source), 55);
}

#[test]
fn heap_round_trip_preserves_the_low_byte() {
    let source = "\
VAL DEFV uint64 val 0x0102030405060708
MEM ALLOC ptr 16
MEM WRITE ptr val 8
MEM READ result ptr 8
CF EXIT result
";
    let err = hoil::assemble(source).unwrap_err();
    // Hex immediates aren't part of this grammar; DEFV only takes decimal/true/false/idN.
    assert!(matches!(err.kind, hoil::ErrorKind::InvalidInteger(_)));

    let source = "\
VAL DEFV uint64 val 72623859790382856
MEM ALLOC ptr 16
MEM WRITE ptr val 8
MEM READ result ptr 8
CF EXIT result
";
    assert_eq!(run(source), 8);
}

#[test]
fn undefined_label_is_a_fatal_assembler_error() {
    let err = hoil::assemble("CF JMP nowhere\n").unwrap_err();
    assert!(matches!(err.kind, hoil::ErrorKind::Label(_)));
}

#[test]
fn forward_call_returns_to_the_instruction_after_call() {
    let source = "\
VAL DEFV int64 result 0
CF CALL sub
CF EXIT result
CF LABEL sub
VAL DEFV int64 result 9
CF RET
";
    // `result` is redefined inside `sub`, which is fatal; exercise the
    // call/return pairing itself instead of reusing the name.
    let err = hoil::assemble(source).unwrap_err();
    assert!(matches!(err.kind, hoil::ErrorKind::Symbol(_)));

    let source = "\
VAL DEFV int64 result 0
VAL DEFV int64 nine 9
CF CALL sub
CF EXIT result
CF LABEL sub
VAL MOVV int64 result nine
CF RET
";
    assert_eq!(run(source), 9);
}

#[test]
fn division_by_zero_is_fatal_at_runtime() {
    let source = "\
VAL DEFV int64 z 0
VAL DEFV int64 x 5
MATH DIV q x z
CF EXIT 1
";
    let records = hoil::assemble(source).unwrap();
    let mut bytes = Vec::new();
    hoil::write_binary(&records, &mut bytes).unwrap();
    let mut vm = Vm::load(&bytes).unwrap();
    assert!(vm.run().is_err());
}
