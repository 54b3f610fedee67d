//! Aggregate operation descriptors.
//!
//! An [`AggregateOperation`] is the type-erased form of a combiner: it creates an
//! accumulator, accumulates items from each input ordinal (one step per input,
//! so co-grouping operations have arity > 1), merges partial accumulators and
//! finishes an accumulator into a result item.
//!
//! The planner splits every grouping into a local pre-aggregation followed by a
//! distributed combine. The local half runs the operation with an **identity**
//! finish (see [`AggregateOperation::with_identity_finish`]) so the partial
//! accumulator itself flows to the combiner, which applies the real finish.
//!
//! Typed combiners implement [`CombineFn`] and are lowered with
//! [`AggregateOperation::from_combine_fn`].

use crate::function::{Item, erased_fn};
use std::any::Any;
use std::marker::PhantomData;
use std::ops::Add;
use std::sync::Arc;

/// A type-erased accumulator.
pub type Accumulator = Box<dyn Any + Send + Sync>;

erased_fn!(
    /// Creates a fresh accumulator.
    CreateFn, () -> Accumulator
);
erased_fn!(
    /// Folds one input item into an accumulator.
    AccumulateFn, (acc: &mut Accumulator, item: &Item) -> ()
);
erased_fn!(
    /// Merges a partial accumulator into another.
    MergeFn, (acc: &mut Accumulator, other: Accumulator) -> ()
);
erased_fn!(
    /// Turns a finished accumulator into the result item.
    FinishFn, (acc: Accumulator) -> Item
);

/// Typed combiner: `V` inputs, `A` accumulator, `O` output.
pub trait CombineFn<V, A, O>: Send + Sync + 'static {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: &V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

#[derive(Clone)]
enum Finish {
    Identity,
    Apply(FinishFn),
}

/// Type-erased aggregate operation with one accumulate step per input.
#[derive(Clone)]
pub struct AggregateOperation {
    create: CreateFn,
    accumulate: Arc<[AccumulateFn]>,
    merge: MergeFn,
    finish: Finish,
}

impl AggregateOperation {
    /// Start building an operation around `create`, with `first` as the
    /// accumulate step of input 0.
    pub fn builder(create: CreateFn, first: AccumulateFn) -> AggregateOperationBuilder {
        AggregateOperationBuilder {
            create,
            accumulate: vec![first],
        }
    }

    /// Lower a typed combiner to an arity-1 operation.
    ///
    /// Items that are not `V` are ignored by the accumulate step.
    pub fn from_combine_fn<C, V, A, O>(combiner: C) -> Self
    where
        C: CombineFn<V, A, O>,
        V: Any + Send + Sync,
        A: Any + Send + Sync,
        O: Any + Send + Sync,
    {
        Self::from_combine_fn_with_arity(combiner, 1)
    }

    /// Lower a typed combiner, using the same accumulate step for `arity` inputs.
    pub fn from_combine_fn_with_arity<C, V, A, O>(combiner: C, arity: usize) -> Self
    where
        C: CombineFn<V, A, O>,
        V: Any + Send + Sync,
        A: Any + Send + Sync,
        O: Any + Send + Sync,
    {
        let combiner = Arc::new(combiner);
        let c = Arc::clone(&combiner);
        let create = CreateFn::new(move || Box::new(c.create()) as Accumulator);

        let c = Arc::clone(&combiner);
        let step = AccumulateFn::new(move |acc, it| {
            if let (Some(a), Some(v)) = (acc.downcast_mut::<A>(), it.downcast_ref::<V>()) {
                c.add_input(a, v);
            }
        });

        let c = Arc::clone(&combiner);
        let merge = MergeFn::new(move |acc, other| {
            if let (Some(a), Ok(b)) = (acc.downcast_mut::<A>(), other.downcast::<A>()) {
                c.merge(a, *b);
            }
        });

        let c = combiner;
        let finish = FinishFn::new(move |acc| match acc.downcast::<A>() {
            Ok(a) => Arc::new(c.finish(*a)) as Item,
            Err(opaque) => Arc::from(opaque),
        });

        Self {
            create,
            accumulate: vec![step; arity.max(1)].into(),
            merge,
            finish: Finish::Apply(finish),
        }
    }

    /// Number of input streams the operation accepts.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.accumulate.len()
    }

    #[must_use]
    pub fn create_fn(&self) -> &CreateFn {
        &self.create
    }

    /// Accumulate step for input `ordinal`, if the operation has one.
    #[must_use]
    pub fn accumulate_fn(&self, ordinal: usize) -> Option<&AccumulateFn> {
        self.accumulate.get(ordinal)
    }

    #[must_use]
    pub fn merge_fn(&self) -> &MergeFn {
        &self.merge
    }

    /// The finish step, or `None` when the operation finishes with identity.
    #[must_use]
    pub fn finish_fn(&self) -> Option<&FinishFn> {
        match &self.finish {
            Finish::Identity => None,
            Finish::Apply(f) => Some(f),
        }
    }

    #[must_use]
    pub fn has_identity_finish(&self) -> bool {
        matches!(self.finish, Finish::Identity)
    }

    /// Same operation, but emitting the raw accumulator instead of a result.
    #[must_use]
    pub fn with_identity_finish(&self) -> Self {
        Self {
            finish: Finish::Identity,
            ..self.clone()
        }
    }

    /// Short label of the finish step for plan explanations.
    #[must_use]
    pub fn finish_label(&self) -> &'static str {
        match self.finish {
            Finish::Identity => "identity",
            Finish::Apply(_) => "apply",
        }
    }

    pub fn create_accumulator(&self) -> Accumulator {
        self.create.call()
    }

    /// Finish an accumulator; identity returns the accumulator itself as an item.
    pub fn finish(&self, acc: Accumulator) -> Item {
        match &self.finish {
            Finish::Identity => Arc::from(acc),
            Finish::Apply(f) => f.call(acc),
        }
    }

    /// `true` if both values share the same accumulate steps and finish.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.create.same_as(&other.create)
            && Arc::ptr_eq(&self.accumulate, &other.accumulate)
            && self.merge.same_as(&other.merge)
            && match (&self.finish, &other.finish) {
                (Finish::Identity, Finish::Identity) => true,
                (Finish::Apply(a), Finish::Apply(b)) => a.same_as(b),
                _ => false,
            }
    }

    /// `true` if `self` is `other` with its finish replaced (or kept) by identity.
    #[must_use]
    pub fn derives_from(&self, other: &Self) -> bool {
        self.create.same_as(&other.create)
            && Arc::ptr_eq(&self.accumulate, &other.accumulate)
            && self.merge.same_as(&other.merge)
    }
}

impl std::fmt::Debug for AggregateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateOperation")
            .field("arity", &self.arity())
            .field("finish", &self.finish_label())
            .finish()
    }
}

/// Builder returned by [`AggregateOperation::builder`].
pub struct AggregateOperationBuilder {
    create: CreateFn,
    accumulate: Vec<AccumulateFn>,
}

impl AggregateOperationBuilder {
    /// Add the accumulate step for the next input ordinal.
    #[must_use]
    pub fn and_accumulate(mut self, step: AccumulateFn) -> Self {
        self.accumulate.push(step);
        self
    }

    /// Finish the operation with `merge` and `finish`.
    #[must_use]
    pub fn and_finish(self, merge: MergeFn, finish: FinishFn) -> AggregateOperation {
        AggregateOperation {
            create: self.create,
            accumulate: self.accumulate.into(),
            merge,
            finish: Finish::Apply(finish),
        }
    }
}

/* ===================== Count ===================== */

/// Counts input items.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl<V> CombineFn<V, u64, u64> for Count {
    fn create(&self) -> u64 {
        0
    }

    fn add_input(&self, acc: &mut u64, _v: &V) {
        *acc += 1;
    }

    fn merge(&self, acc: &mut u64, other: u64) {
        *acc += other;
    }

    fn finish(&self, acc: u64) -> u64 {
        acc
    }
}

/* ===================== Sum<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Sum<T>(PhantomData<T>);

impl<T> Sum<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> CombineFn<T, T, T> for Sum<T>
where
    T: Add<Output = T> + Default + Clone + Send + Sync + 'static,
{
    fn create(&self) -> T {
        T::default()
    }

    fn add_input(&self, acc: &mut T, v: &T) {
        *acc = std::mem::take(acc) + v.clone();
    }

    fn merge(&self, acc: &mut T, other: T) {
        *acc = std::mem::take(acc) + other;
    }

    fn finish(&self, acc: T) -> T {
        acc
    }
}

/* ===================== ToList<T> ===================== */

/// Collects input items into a `Vec`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToList<T>(PhantomData<T>);

impl<T> ToList<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> CombineFn<T, Vec<T>, Vec<T>> for ToList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn create(&self) -> Vec<T> {
        Vec::new()
    }

    fn add_input(&self, acc: &mut Vec<T>, v: &T) {
        acc.push(v.clone());
    }

    fn merge(&self, acc: &mut Vec<T>, mut other: Vec<T>) {
        acc.append(&mut other);
    }

    fn finish(&self, acc: Vec<T>) -> Vec<T> {
        acc
    }
}

/// Counting operation over any item type.
pub fn counting() -> AggregateOperation {
    co_counting(1)
}

/// Counting operation accepting `arity` inputs; items from every input count.
pub fn co_counting(arity: usize) -> AggregateOperation {
    let step = AccumulateFn::new(|acc, _| {
        if let Some(n) = acc.downcast_mut::<u64>() {
            *n += 1;
        }
    });
    let mut builder = AggregateOperation::builder(
        CreateFn::new(|| Box::new(0u64) as Accumulator),
        step.clone(),
    );
    for _ in 1..arity {
        builder = builder.and_accumulate(step.clone());
    }
    builder.and_finish(
        MergeFn::new(|acc, other| {
            if let (Some(a), Ok(b)) = (acc.downcast_mut::<u64>(), other.downcast::<u64>()) {
                *a += *b;
            }
        }),
        FinishFn::new(|acc| match acc.downcast::<u64>() {
            Ok(n) => Arc::new(*n) as Item,
            Err(opaque) => Arc::from(opaque),
        }),
    )
}
