use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use quarry::schema::{Blueprint, grammar as schema_grammar};
use quarry::{Builder, Dialect};

const DIALECTS: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite];

/// `select ... from "t" where "col0" = ? and ... order by "id" desc limit 20`.
fn build_select(dialect: Dialect, n: usize) -> Builder {
    let mut query = Builder::table(dialect, "t")
        .join("u", "u.id", "=", "t.u_id")
        .select(&["t.*", "u.name as owner"]);
    for i in 0..n {
        query = query.where_op(&format!("col{i}"), "=", i as i64);
    }
    query.order_by_desc("id").limit(20)
}

fn bench_compile_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("grammar/compile_select");

    for dialect in DIALECTS {
        for n in [1, 10, 50] {
            let query = build_select(dialect, n);
            let id = BenchmarkId::new(dialect.name(), n);
            group.bench_with_input(id, &query, |b, query| {
                b.iter(|| black_box((query.to_sql(), query.get_bindings())));
            });
        }
    }

    group.finish();
}

fn bench_where_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("grammar/where_in");

    for n in [10, 100, 1000] {
        let ids: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| {
                let query = Builder::table(Dialect::Postgres, "t").where_in("id", ids.iter().copied());
                black_box(query.to_sql());
            });
        });
    }

    group.finish();
}

fn bench_nested_clone(c: &mut Criterion) {
    let query = build_select(Dialect::Postgres, 10)
        .where_nested(|q| q.where_eq("a", 1).or_where_null("b"))
        .where_in_sub("u_id", |q| q.from("members").select(&["user_id"]).where_eq("active", true));

    c.bench_function("grammar/clone_and_compile", |b| {
        b.iter(|| {
            let copy = query.clone().limit(5);
            black_box(copy.to_sql());
        });
    });
}

fn bench_blueprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("grammar/blueprint");

    for dialect in DIALECTS {
        group.bench_function(dialect.name(), |b| {
            b.iter(|| {
                let mut table = Blueprint::new("orders");
                table.create();
                table.id();
                table.foreign_id("user_id");
                table.string("status", 32).default("new").index();
                table.decimal("total", 10, 2);
                table.timestamps();
                table.foreign(&["user_id"]).on("users").cascade_on_delete();
                black_box(table.to_sql(schema_grammar::for_dialect(dialect)).ok());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_select,
    bench_where_in,
    bench_nested_clone,
    bench_blueprint
);
criterion_main!(benches);
