mod backward;
mod binary;
mod mutation;

use criterion::criterion_group;

criterion_group!(benches, binary::basic, mutation::basic, backward::basic);
