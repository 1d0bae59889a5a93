use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use clinic_gate::guard::{decide, RouteGuard};
use clinic_gate::identity::{normalize, Principal, Role};
use clinic_gate::routes::clinic_routes;
use clinic_gate::session::Session;

const LABELS: &[&str] = &["doctor", "Clinician-Admin", "  Lab   Tech ", "RN", "night janitor", ""];

const PATHS: &[&str] = &[
    "/login",
    "/doctor/appointments/42",
    "/pharmacy/orders/17/items",
    "/mental-health/journal?tab=today",
    "/nowhere",
];

fn signed_in(role: Role) -> Session {
    Session::authenticated("bench", Principal { role: role.as_str().into(), ..Default::default() })
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for label in LABELS {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", label)), label, |b, l| {
            b.iter(|| normalize(black_box(Some(*l))));
        });
    }
    group.finish();
}

fn bench_decide(c: &mut Criterion) {
    let allowed = ["patient", "doctor", "pharmacist"];
    let mut group = c.benchmark_group("decide");
    for role in [Role::Doctor, Role::Nurse] {
        let s = signed_in(role);
        group.bench_function(role.as_str(), |b| b.iter(|| decide(black_box(&s), Some(&allowed[..]))));
    }
    group.finish();
}

fn bench_guard_check(c: &mut Criterion) {
    let guard = match clinic_routes() {
        Ok(t) => RouteGuard::new(t),
        Err(e) => panic!("routing table: {}", e),
    };
    let session = signed_in(Role::Patient);
    let mut group = c.benchmark_group("guard_check");
    for path in PATHS {
        group.bench_with_input(BenchmarkId::from_parameter(path), path, |b, p| {
            b.iter(|| guard.check(black_box(p), &session));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_decide, bench_guard_check);
criterion_main!(benches);
