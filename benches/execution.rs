//! Execution benchmarks for the WebAssembly interpreter.
//!
//! These measure instruction dispatch and call overhead with modules
//! built directly against the decoded-module interface (a loader would
//! normally produce them).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stave::instruction::{BlockType, Instruction};
use stave::module::{Export, ExportDesc, FunctionBody, FunctionType, Module, ValueType};
use stave::runtime::Value;
use stave::vm::{Config, Vm};
use std::hint::black_box;

/// run(n): loop n times doing nothing but the loop bookkeeping.
fn countdown_module() -> Module {
    let mut module = Module::default();
    module.types.push(FunctionType {
        params: vec![ValueType::I32],
        results: vec![ValueType::I32],
    });
    module.functions.push(0);
    module.code.push(FunctionBody {
        locals: vec![],
        body: vec![
            Instruction::Block {
                block_type: BlockType::Empty,
            },
            Instruction::Loop {
                block_type: BlockType::Empty,
            },
            Instruction::LocalGet { local_idx: 0 },
            Instruction::I32Eqz,
            Instruction::BrIf { label_idx: 1 },
            Instruction::LocalGet { local_idx: 0 },
            Instruction::I32Const { value: 1 },
            Instruction::I32Sub,
            Instruction::LocalSet { local_idx: 0 },
            Instruction::Br { label_idx: 0 },
            Instruction::End,
            Instruction::End,
            Instruction::LocalGet { local_idx: 0 },
            Instruction::End,
        ],
    });
    module.exports.push(Export {
        name: "run".to_string(),
        desc: ExportDesc::Function(0),
    });
    module
}

/// fib(n), iteratively, in two locals.
fn fib_module() -> Module {
    let mut module = Module::default();
    module.types.push(FunctionType {
        params: vec![ValueType::I32],
        results: vec![ValueType::I32],
    });
    module.functions.push(0);
    module.code.push(FunctionBody {
        // local 1 = a, local 2 = b, local 3 = scratch
        locals: vec![(3, ValueType::I32)],
        body: vec![
            // b = 1
            Instruction::I32Const { value: 1 },
            Instruction::LocalSet { local_idx: 2 },
            Instruction::Block {
                block_type: BlockType::Empty,
            },
            Instruction::Loop {
                block_type: BlockType::Empty,
            },
            // while n != 0
            Instruction::LocalGet { local_idx: 0 },
            Instruction::I32Eqz,
            Instruction::BrIf { label_idx: 1 },
            // scratch = a + b; a = b; b = scratch
            Instruction::LocalGet { local_idx: 1 },
            Instruction::LocalGet { local_idx: 2 },
            Instruction::I32Add,
            Instruction::LocalSet { local_idx: 3 },
            Instruction::LocalGet { local_idx: 2 },
            Instruction::LocalSet { local_idx: 1 },
            Instruction::LocalGet { local_idx: 3 },
            Instruction::LocalSet { local_idx: 2 },
            // n -= 1
            Instruction::LocalGet { local_idx: 0 },
            Instruction::I32Const { value: 1 },
            Instruction::I32Sub,
            Instruction::LocalSet { local_idx: 0 },
            Instruction::Br { label_idx: 0 },
            Instruction::End,
            Instruction::End,
            Instruction::LocalGet { local_idx: 1 },
            Instruction::End,
        ],
    });
    module.exports.push(Export {
        name: "fib".to_string(),
        desc: ExportDesc::Function(0),
    });
    module
}

fn instantiate(module: Module) -> Vm {
    let mut vm = Vm::new(Config::default());
    vm.load(module).expect("load");
    vm.validate().expect("validate");
    vm.instantiate().expect("instantiate");
    vm
}

/// Verify module correctness before benchmarking
fn verify_modules() {
    let mut vm = instantiate(countdown_module());
    let result = vm.invoke(None, "run", &[Value::I32(1000)]).unwrap();
    assert_eq!(result, vec![Value::I32(0)], "countdown(1000) should reach 0");

    let mut vm = instantiate(fib_module());
    for (n, expected) in [(0, 0), (1, 1), (10, 55), (20, 6765), (40, 102334155)] {
        let result = vm.invoke(None, "fib", &[Value::I32(n)]).unwrap();
        assert_eq!(result, vec![Value::I32(expected)], "fib({n}) should be {expected}");
    }
}

fn bench_dispatch(c: &mut Criterion) {
    verify_modules();

    let mut group = c.benchmark_group("dispatch");
    for n in [1_000u32, 100_000] {
        group.bench_with_input(BenchmarkId::new("countdown", n), &n, |b, &n| {
            let mut vm = instantiate(countdown_module());
            b.iter(|| vm.invoke(None, "run", &[Value::I32(black_box(n))]).unwrap());
        });
    }
    group.finish();
}

fn bench_fib(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib");
    for n in [20u32, 40] {
        group.bench_with_input(BenchmarkId::new("iterative", n), &n, |b, &n| {
            let mut vm = instantiate(fib_module());
            b.iter(|| vm.invoke(None, "fib", &[Value::I32(black_box(n))]).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_fib);
criterion_main!(benches);
