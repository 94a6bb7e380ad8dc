#![allow(
    dead_code, // OK for benches
    clippy::needless_range_loop, // Suggests less readable code
)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use placeholder::cs::implementations::lpc::ListPolynomialCommitment;
use placeholder::cs::implementations::polynomial::{
    FftPrecomputations, GenericPolynomial, LagrangeForm,
};
use placeholder::cs::implementations::transcript::Blake2sTranscript;
use placeholder::cs::{
    AssignmentTable, ColumnType, ConstraintSystem, CopyConstraint, Expression, Gate,
    TableDescription, Variable,
};
use placeholder::field::goldilocks::GoldilocksField;
use placeholder::field::Field;
use placeholder::worker::Worker;
use placeholder::{preprocess_private, preprocess_public, prove, verify, FriParams};

type F = GoldilocksField;
type H = blake2::Blake2s256;

const MUL_UPPER_BOUND: usize = 1024;
const FIBONACCI_ROWS: usize = 1000;

fn criterion_benchmark_multiplication(c: &mut Criterion) {
    let aa: Vec<F> = (0..MUL_UPPER_BOUND)
        .map(|x| F::from_u64_with_reduction(x as u64 + 1))
        .collect();
    let bb: Vec<F> = (0..MUL_UPPER_BOUND)
        .map(|x| F::from_u64_with_reduction(x as u64 + MUL_UPPER_BOUND as u64))
        .collect();
    c.bench_function("Goldilocks baseline", |b| {
        b.iter(|| {
            let mut aa = black_box(aa.clone());
            let bb = black_box(&bb);
            for (dst, src) in aa.iter_mut().zip(bb.iter()) {
                dst.mul_assign(src);
            }
        })
    });
}

fn criterion_benchmark_ifft(c: &mut Criterion) {
    let worker = Worker::new();
    let size = 1 << 16;
    let precomputations = FftPrecomputations::<F>::new(size, &worker);
    let values: Vec<F> = (0..size)
        .map(|x| F::from_u64_with_reduction(x as u64))
        .collect();
    c.bench_function("iFFT of size 2^16", |b| {
        b.iter(|| {
            GenericPolynomial::<F, LagrangeForm>::from_storage(black_box(values.clone()))
                .ifft(&precomputations)
        })
    });
}

fn fibonacci() -> (ConstraintSystem<F>, TableDescription, AssignmentTable<F>) {
    let desc = TableDescription {
        witness_columns: 1,
        public_input_columns: 1,
        constant_columns: 0,
        selector_columns: 1,
        usable_rows: FIBONACCI_ROWS,
        rows_amount: FIBONACCI_ROWS.next_power_of_two(),
    };
    let w0 = |rotation: i32| -> Expression<F> { Variable::witness(0).rotated(rotation).into() };
    let cs = ConstraintSystem::new(
        vec![Gate {
            selector_index: 0,
            constraints: vec![w0(2) - w0(1) - w0(0)],
        }],
        vec![CopyConstraint {
            a: Variable::witness(0).at_row(FIBONACCI_ROWS - 1),
            b: Variable::public_input(0).at_row(0),
        }],
        vec![],
        vec![],
    )
    .with_public_input_sizes(vec![1]);

    let mut sequence = vec![F::ONE, F::ONE];
    while sequence.len() < FIBONACCI_ROWS {
        let mut next = sequence[sequence.len() - 1];
        next.add_assign(&sequence[sequence.len() - 2]);
        sequence.push(next);
    }
    let mut table = AssignmentTable::new(&desc);
    let columns = [
        (ColumnType::Witness, sequence.clone()),
        (ColumnType::PublicInput, vec![sequence[FIBONACCI_ROWS - 1]]),
        (ColumnType::Selector, vec![F::ONE; FIBONACCI_ROWS - 2]),
    ];
    for (column_type, values) in columns.iter() {
        table
            .set_column(*column_type, 0, values)
            .expect("column fits the table");
    }

    (cs, desc, table)
}

fn criterion_benchmark_fibonacci(c: &mut Criterion) {
    let worker = Worker::new();
    let params = FriParams {
        lde_factor: 4,
        max_degree_log2: 10,
        cap_size: 16,
        security_level: 64,
        pow_bits: 8,
        folding_schedule: None,
    };
    let (cs, desc, table) = fibonacci();
    let public_inputs = vec![table.public_table.public_inputs[0][..1].to_vec()];
    let mut lpc = ListPolynomialCommitment::<F, H>::new(params.clone(), &worker)
        .expect("parameters are valid");
    let public_data = preprocess_public(&cs, &table.public_table, &desc, &mut lpc, 0, &worker)
        .expect("circuit is well formed");
    let private_data =
        preprocess_private(&cs, &table.private_table, &desc, &worker).expect("table fits");

    c.bench_function("Fibonacci prove", |b| {
        b.iter(|| {
            prove::<F, H, Blake2sTranscript>(
                &cs,
                &desc,
                &public_data,
                &private_data,
                &mut lpc,
                &worker,
            )
            .expect("circuit is satisfied")
        })
    });

    let proof = prove::<F, H, Blake2sTranscript>(
        &cs,
        &desc,
        &public_data,
        &private_data,
        &mut lpc,
        &worker,
    )
    .expect("circuit is satisfied");
    let mut verifier_lpc =
        ListPolynomialCommitment::<F, H>::new(params, &worker).expect("parameters are valid");
    c.bench_function("Fibonacci verify", |b| {
        b.iter(|| {
            assert!(verify::<F, H, Blake2sTranscript>(
                &cs,
                &desc,
                &public_data.common_data,
                &public_inputs,
                &proof,
                &mut verifier_lpc,
            ))
        })
    });
}

criterion_group!(
    benches,
    criterion_benchmark_multiplication,
    criterion_benchmark_ifft,
    criterion_benchmark_fibonacci,
);
criterion_main!(benches);
