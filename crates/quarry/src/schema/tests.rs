use super::*;
use crate::config::Dialect;
use crate::error::DbError;
use crate::value::{Value, raw};

fn sql(blueprint: &Blueprint, dialect: Dialect) -> Vec<String> {
    blueprint
        .to_sql(grammar::for_dialect(dialect))
        .unwrap_or_else(|e| panic!("{} compile failed: {e}", dialect.name()))
}

fn orders() -> Blueprint {
    let mut t = Blueprint::new("orders");
    t.create();
    t.id();
    t.string("note", 0).nullable().default("none");
    t.foreign_id("user_id");
    t.foreign(&["user_id"]).on("users").cascade_on_delete();
    t
}

// ── create ──────────────────────────────────────────────────────────────────

#[test]
fn create_with_key_and_foreign_postgres() {
    assert_eq!(
        sql(&orders(), Dialect::Postgres),
        vec![
            r#"create table "orders" ("id" bigserial not null primary key, "note" varchar(255) null default 'none', "user_id" bigint not null)"#,
            r#"alter table "orders" add constraint "orders_user_id_foreign" foreign key ("user_id") references "users" ("id") on delete cascade"#,
        ]
    );
}

#[test]
fn create_with_key_and_foreign_mysql() {
    assert_eq!(
        sql(&orders(), Dialect::MySql),
        vec![
            "create table `orders` (`id` bigint unsigned not null auto_increment primary key, `note` varchar(255) null default 'none', `user_id` bigint unsigned not null)",
            "alter table `orders` add constraint `orders_user_id_foreign` foreign key (`user_id`) references `users` (`id`) on delete cascade",
        ]
    );
}

#[test]
fn sqlite_inlines_foreign_keys() {
    assert_eq!(
        sql(&orders(), Dialect::Sqlite),
        vec![
            r#"create table "orders" ("id" integer not null primary key autoincrement, "note" varchar default 'none', "user_id" integer not null, foreign key ("user_id") references "users" ("id") on delete cascade)"#
        ]
    );
}

#[test]
fn sqlite_inlines_composite_primary_key() {
    let mut t = Blueprint::new("pairs");
    t.create();
    t.integer("a");
    t.integer("b");
    t.primary(&["a", "b"]);
    assert_eq!(
        sql(&t, Dialect::Sqlite),
        vec![r#"create table "pairs" ("a" integer not null, "b" integer not null, primary key ("a", "b"))"#]
    );
    assert_eq!(
        sql(&t, Dialect::Postgres)[1],
        r#"alter table "pairs" add primary key ("a", "b")"#
    );
}

#[test]
fn mysql_table_options() {
    let mut t = Blueprint::new("t");
    t.create();
    t.charset("utf8mb4");
    t.collation("utf8mb4_unicode_ci");
    t.engine("InnoDB");
    t.increments("id");
    assert_eq!(
        sql(&t, Dialect::MySql),
        vec![
            "create table `t` (`id` int unsigned not null auto_increment primary key) default character set utf8mb4 collate 'utf8mb4_unicode_ci' engine = InnoDB"
        ]
    );
}

#[test]
fn temporary_table() {
    let mut t = Blueprint::new("scratch");
    t.create();
    t.temporary();
    t.text("body");
    assert_eq!(
        sql(&t, Dialect::Sqlite),
        vec![r#"create temporary table "scratch" ("body" text not null)"#]
    );
}

// ── column types and modifiers ──────────────────────────────────────────────

#[test]
fn postgres_column_types() {
    let mut t = Blueprint::new("things");
    t.create();
    t.enumeration("status", &["draft", "live"]);
    t.timestamp("seen_at").use_current();
    t.timestamp_tz("synced_at").nullable();
    t.decimal("price", 8, 2).default(0);
    t.boolean("active").default(true);
    t.jsonb("meta").default(raw("'{}'::jsonb"));
    assert_eq!(
        sql(&t, Dialect::Postgres),
        vec![concat!(
            r#"create table "things" ("#,
            r#""status" varchar(255) check ("status" in ('draft', 'live')) not null, "#,
            r#""seen_at" timestamp(0) without time zone not null default CURRENT_TIMESTAMP, "#,
            r#""synced_at" timestamp(0) with time zone null, "#,
            r#""price" decimal(8, 2) not null default '0', "#,
            r#""active" boolean not null default '1', "#,
            r#""meta" jsonb not null default '{}'::jsonb)"#
        )]
    );
}

#[test]
fn mysql_column_modifiers() {
    let mut t = Blueprint::new("users");
    t.string("nick", 40)
        .nullable()
        .charset("utf8mb4")
        .comment("display name")
        .after("email");
    t.timestamp("updated_at").use_current().use_current_on_update();
    t.enumeration("role", &["admin", "user"]).first();
    assert_eq!(
        sql(&t, Dialect::MySql),
        vec![concat!(
            "alter table `users` ",
            "add `nick` varchar(40) character set utf8mb4 null comment 'display name' after `email`, ",
            "add `updated_at` timestamp not null default CURRENT_TIMESTAMP on update CURRENT_TIMESTAMP, ",
            "add `role` enum('admin', 'user') not null first"
        )]
    );
}

#[test]
fn generated_columns() {
    let mut t = Blueprint::new("people");
    t.create();
    t.string("full_name", 0).stored_as("first || ' ' || last");
    assert_eq!(
        sql(&t, Dialect::Postgres),
        vec![r#"create table "people" ("full_name" varchar(255) not null generated always as (first || ' ' || last) stored)"#]
    );

    let mut v = Blueprint::new("people");
    v.create();
    v.string("full_name", 0).virtual_as("concat(first, last)");
    assert!(matches!(
        v.to_sql(grammar::for_dialect(Dialect::Postgres)),
        Err(DbError::Schema(_))
    ));
    assert_eq!(
        sql(&v, Dialect::MySql),
        vec!["create table `people` (`full_name` varchar(255) as (concat(first, last)) not null)"]
    );
}

#[test]
fn postgres_column_comments_follow_create() {
    let mut t = Blueprint::new("t");
    t.create();
    t.integer("n").comment("it's a count");
    t.comment("counters");
    assert_eq!(
        sql(&t, Dialect::Postgres),
        vec![
            r#"create table "t" ("n" integer not null)"#,
            r#"comment on column "t"."n" is 'it''s a count'"#,
            r#"comment on table "t" is 'counters'"#,
        ]
    );
    assert_eq!(sql(&t, Dialect::Sqlite).len(), 1);
}

// ── alter ───────────────────────────────────────────────────────────────────

fn alter_users() -> Blueprint {
    let mut t = Blueprint::new("users");
    t.string("nick", 40).nullable().unique();
    t.integer("age").change();
    t
}

#[test]
fn implied_commands_on_existing_table() {
    let commands = alter_users().commands_with_implied();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0], Command::Add);
    assert_eq!(commands[1], Command::Change);
    match &commands[2] {
        Command::Index(index) => {
            assert_eq!(index.kind, IndexKind::Unique);
            assert_eq!(index.name, "users_nick_unique");
            assert_eq!(index.columns, vec!["nick".to_string()]);
        }
        other => panic!("expected unique index, got {other:?}"),
    }
}

#[test]
fn create_does_not_imply_add() {
    assert!(
        !orders()
            .commands_with_implied()
            .iter()
            .any(|c| matches!(c, Command::Add | Command::Change))
    );
}

#[test]
fn alter_postgres() {
    assert_eq!(
        sql(&alter_users(), Dialect::Postgres),
        vec![
            r#"alter table "users" add column "nick" varchar(40) null"#,
            r#"alter table "users" alter column "age" type integer, alter column "age" set not null, alter column "age" drop default"#,
            r#"alter table "users" add constraint "users_nick_unique" unique ("nick")"#,
        ]
    );
}

#[test]
fn alter_mysql() {
    assert_eq!(
        sql(&alter_users(), Dialect::MySql),
        vec![
            "alter table `users` add `nick` varchar(40) null",
            "alter table `users` modify `age` int not null",
            "alter table `users` add unique `users_nick_unique`(`nick`)",
        ]
    );
}

#[test]
fn sqlite_rejects_column_changes() {
    let err = alter_users()
        .to_sql(grammar::for_dialect(Dialect::Sqlite))
        .unwrap_err();
    assert!(matches!(err, DbError::Schema(ref m) if m.contains("sqlite")), "{err}");
}

#[test]
fn sqlite_add_columns_one_statement_each() {
    let mut t = Blueprint::new("users");
    t.string("nick", 40).nullable().unique();
    t.boolean("admin").default(false);
    assert_eq!(
        sql(&t, Dialect::Sqlite),
        vec![
            r#"alter table "users" add column "nick" varchar"#,
            r#"alter table "users" add column "admin" tinyint(1) not null default '0'"#,
            r#"create unique index "users_nick_unique" on "users" ("nick")"#,
        ]
    );
}

#[test]
fn sqlite_rejects_keys_on_existing_tables() {
    let lite = grammar::for_dialect(Dialect::Sqlite);

    let mut fk = Blueprint::new("posts");
    fk.foreign(&["user_id"]).on("users");
    assert!(matches!(fk.to_sql(lite), Err(DbError::Schema(_))));

    let mut pk = Blueprint::new("posts");
    pk.drop_primary(None);
    assert!(matches!(pk.to_sql(lite), Err(DbError::Schema(_))));

    let mut ft = Blueprint::new("posts");
    ft.fulltext(&["body"]);
    assert!(matches!(ft.to_sql(lite), Err(DbError::Schema(_))));

    let mut inc = Blueprint::new("posts");
    inc.increments("seq");
    assert!(matches!(inc.to_sql(lite), Err(DbError::Schema(_))));
}

#[test]
fn foreign_key_requires_referenced_table() {
    let mut t = Blueprint::new("posts");
    t.foreign(&["user_id"]);
    let err = t.to_sql(grammar::for_dialect(Dialect::Postgres)).unwrap_err();
    assert!(err.to_string().contains("posts_user_id_foreign"), "{err}");
}

#[test]
fn indexes_per_dialect() {
    let mut t = Blueprint::new("posts");
    t.index(&["author_id", "created_at"]);
    t.fulltext(&["title", "body"]).name("posts_search");
    t.index(&["tags"]).algorithm("gin");

    assert_eq!(
        sql(&t, Dialect::Postgres),
        vec![
            r#"create index "posts_author_id_created_at_index" on "posts" ("author_id", "created_at")"#,
            r#"create index "posts_search" on "posts" using gin ((to_tsvector('english', "title") || to_tsvector('english', "body")))"#,
            r#"create index "posts_tags_index" on "posts" using gin ("tags")"#,
        ]
    );
    assert_eq!(
        sql(&t, Dialect::MySql)[..2],
        [
            "alter table `posts` add index `posts_author_id_created_at_index`(`author_id`, `created_at`)",
            "alter table `posts` add fulltext `posts_search`(`title`, `body`)",
        ]
    );
}

#[test]
fn index_names_are_normalized() {
    let t = Blueprint::new("My-Table");
    assert_eq!(
        t.index_name("index", &["a.b".to_string(), "C".to_string()]),
        "my_table_a_b_c_index"
    );
}

// ── drops and renames ───────────────────────────────────────────────────────

#[test]
fn drops_per_dialect() {
    let mut t = Blueprint::new("users");
    t.drop_column(&["a", "b"]);
    t.drop_primary(None);
    t.drop_unique("users_email_unique");
    t.drop_foreign("users_team_id_foreign");

    assert_eq!(
        sql(&t, Dialect::Postgres),
        vec![
            r#"alter table "users" drop column "a", drop column "b""#,
            r#"alter table "users" drop constraint "users_pkey""#,
            r#"alter table "users" drop constraint "users_email_unique""#,
            r#"alter table "users" drop constraint "users_team_id_foreign""#,
        ]
    );
    assert_eq!(
        sql(&t, Dialect::MySql),
        vec![
            "alter table `users` drop `a`, drop `b`",
            "alter table `users` drop primary key",
            "alter table `users` drop index `users_email_unique`",
            "alter table `users` drop foreign key `users_team_id_foreign`",
        ]
    );
}

#[test]
fn sqlite_drops_columns_one_at_a_time() {
    let mut t = Blueprint::new("users");
    t.drop_timestamps();
    t.drop_index("users_nick_index");
    assert_eq!(
        sql(&t, Dialect::Sqlite),
        vec![
            r#"alter table "users" drop column "created_at""#,
            r#"alter table "users" drop column "updated_at""#,
            r#"drop index "users_nick_index""#,
        ]
    );
}

#[test]
fn table_rename_and_drop() {
    let mut t = Blueprint::new("old");
    t.rename("new");
    assert_eq!(sql(&t, Dialect::Postgres), vec![r#"alter table "old" rename to "new""#]);
    assert_eq!(sql(&t, Dialect::MySql), vec!["rename table `old` to `new`"]);

    let mut c = Blueprint::new("users");
    c.rename_column("nick", "handle");
    assert_eq!(
        sql(&c, Dialect::Sqlite),
        vec![r#"alter table "users" rename column "nick" to "handle""#]
    );

    let mut d = Blueprint::new("users");
    d.drop_if_exists();
    assert_eq!(sql(&d, Dialect::MySql), vec!["drop table if exists `users`"]);
}

// ── introspection ───────────────────────────────────────────────────────────

#[test]
fn introspection_queries_bind_names() {
    let pg = grammar::for_dialect(Dialect::Postgres);
    let (sql, bindings) = pg.compile_table_exists(Some("app"), "users");
    assert!(sql.contains("table_schema = ?"), "{sql}");
    assert_eq!(bindings, vec![Value::from("app"), Value::from("users")]);

    let (sql, bindings) = pg.compile_column_listing(None, "users");
    assert!(sql.contains("current_schema()"), "{sql}");
    assert_eq!(bindings, vec![Value::from("users")]);

    let lite = grammar::for_dialect(Dialect::Sqlite);
    let (sql, bindings) = lite.compile_column_listing(None, "users");
    assert_eq!(sql, "select name as column_name from pragma_table_info(?) order by cid");
    assert_eq!(bindings, vec![Value::from("users")]);
}

#[test]
fn foreign_key_toggles() {
    let statements: Vec<_> = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite]
        .into_iter()
        .map(|d| grammar::for_dialect(d).compile_disable_foreign_key_constraints())
        .collect();
    assert_eq!(
        statements,
        vec![
            "SET CONSTRAINTS ALL DEFERRED",
            "SET FOREIGN_KEY_CHECKS=0",
            "PRAGMA foreign_keys = OFF",
        ]
    );
}
