use crate::error::CoreError;
use crate::lattice::LatticeTable;

use super::*;

fn new_function(context: &mut Context, name: &str, args: Vec<(&str, Dt)>, ret: Dt) -> Function {
    let _ = tracing_subscriber::fmt::try_init();
    let module = Module::new(context, "test_module");
    Function::new(
        context,
        module,
        name.to_owned(),
        args.into_iter().map(|(n, dt)| (n.to_owned(), dt)).collect(),
        ret,
        true,
    )
}

// -------------------------------------------------------------------------------------------------

#[test]
fn entry_block_starts_with_an_empty_phi() {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![], Dt::Void);
    let entry = func.get_entry_block(&context);
    let instructions: Vec<Value> = entry.instruction_iter(&context).collect();
    assert_eq!(instructions.len(), 1);
    assert!(matches!(
        instructions[0].as_instruction(&context),
        Some(Instruction::Phi(alts)) if alts.is_empty()
    ));
}

#[test]
fn replace_operand_maintains_user_edges() {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let one = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 1));
    let add = entry.ins(&mut context).bin_op(BinOpKind::Add, x, one);

    assert_eq!(x.users(&context), vec![(add, 0)]);

    let two = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 2));
    context.replace_operand(add, one, two);

    assert!(one.users(&context).is_empty());
    assert_eq!(two.users(&context), vec![(add, 1)]);
    assert_eq!(add.operands(&context).as_slice(), &[x, two]);
}

#[test]
fn kill_detaches_operands_and_marks_dead() {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let neg = entry.ins(&mut context).un_op(UnOpKind::Neg, x);

    context.kill(neg);

    assert!(neg.is_dead(&context));
    assert!(x.users(&context).is_empty());
}

// -------------------------------------------------------------------------------------------------

#[test]
fn peephole_folds_add_zero_to_identity() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let zero = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 0));
    let sum = entry.ins(&mut context).bin_op(BinOpKind::Add, x, zero);
    entry.ins(&mut context).ret(Some(sum));

    let mut lattice = LatticeTable::default();
    let mut peephole = peephole::PeepholeEngine::new(&mut context, &mut lattice);
    peephole.run(func)?;

    assert!(peephole.rewrites >= 1);
    assert!(sum.is_dead(&context));
    let ret = entry
        .instruction_iter(&context)
        .find(|v| matches!(v.as_instruction(&context), Some(Instruction::Ret(_))))
        .unwrap();
    assert_eq!(ret.operands(&context).as_slice(), &[x]);
    Ok(())
}

#[test]
fn peephole_canonicalizes_commutative_constant_to_the_right() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let five = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 5));
    // `5 + x`, constant on the left: idealize should flip it to `x + 5`.
    let sum = entry.ins(&mut context).bin_op(BinOpKind::Add, five, x);
    entry.ins(&mut context).ret(Some(sum));

    let mut lattice = LatticeTable::default();
    let mut peephole = peephole::PeepholeEngine::new(&mut context, &mut lattice);
    peephole.run(func)?;

    let ret = entry
        .instruction_iter(&context)
        .find(|v| matches!(v.as_instruction(&context), Some(Instruction::Ret(_))))
        .unwrap();
    let folded = ret.operands(&context)[0];
    match folded.as_instruction(&context) {
        Some(Instruction::BinOp { op: BinOpKind::Add, lhs, rhs }) => {
            assert_eq!(*lhs, x);
            assert_eq!(*rhs, five);
        }
        other => panic!("expected a surviving add, got {:?}", other),
    }
    Ok(())
}

#[test]
fn peephole_gvns_two_structurally_equal_adds() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32)), ("y", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let y = func.get_arg(&context, "y").unwrap();
    let entry = func.get_entry_block(&context);
    let a = entry.ins(&mut context).bin_op(BinOpKind::Add, x, y);
    let b = entry.ins(&mut context).bin_op(BinOpKind::Add, x, y);
    entry.ins(&mut context).ret(Some(a));
    entry.ins(&mut context).ret(Some(b));

    let mut lattice = LatticeTable::default();
    let mut peephole = peephole::PeepholeEngine::new(&mut context, &mut lattice);
    peephole.run(func)?;

    // Exactly one of {a, b} should survive as the GVN representative.
    assert_ne!(a.is_dead(&context), b.is_dead(&context));
    Ok(())
}

#[test]
fn peephole_xor_self_folds_to_zero_constant() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let xored = entry.ins(&mut context).bin_op(BinOpKind::Xor, x, x);
    entry.ins(&mut context).ret(Some(xored));

    let mut lattice = LatticeTable::default();
    let mut peephole = peephole::PeepholeEngine::new(&mut context, &mut lattice);
    peephole.run(func)?;

    let ret = entry
        .instruction_iter(&context)
        .find(|v| matches!(v.as_instruction(&context), Some(Instruction::Ret(_))))
        .unwrap();
    let folded = ret.operands(&context)[0];
    assert!(folded.is_constant(&context));
    Ok(())
}

// -------------------------------------------------------------------------------------------------

#[test]
fn sccp_materializes_a_constant_add() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![], Dt::Int(32));
    let entry = func.get_entry_block(&context);
    let a = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 2));
    let b = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 3));
    let sum = entry.ins(&mut context).bin_op(BinOpKind::Add, a, b);
    entry.ins(&mut context).ret(Some(sum));

    let mut lattice = LatticeTable::default();
    // Constants need a lattice value before SCCP can fold through them; the
    // peephole pass is what normally seeds this via `pessimistic_value`, so
    // run it first exactly as the pipeline does.
    let mut peephole = peephole::PeepholeEngine::new(&mut context, &mut lattice);
    peephole.run(func)?;
    let mut sccp = sccp::SccpEngine::new(&mut context, &mut lattice);
    sccp.run(func)?;
    let sccp_materialized = sccp.materialized;

    assert!(sum.is_dead(&context) || sccp_materialized >= 1);
    Ok(())
}

// -------------------------------------------------------------------------------------------------

#[test]
fn verify_accepts_a_well_formed_function() -> Result<(), CoreError> {
    let mut context = Context::new();
    let func = new_function(&mut context, "f", vec![("x", Dt::Int(32))], Dt::Int(32));
    let x = func.get_arg(&context, "x").unwrap();
    let entry = func.get_entry_block(&context);
    let one = Value::new_constant(&mut context, Constant::new_iconst(Dt::Int(32), 1));
    let sum = entry.ins(&mut context).bin_op(BinOpKind::Add, x, one);
    entry.ins(&mut context).ret(Some(sum));

    verify::verify(&context, func, None)
}
