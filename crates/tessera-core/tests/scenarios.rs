use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tessera_core::{
    BootstrapState, DomainObject, DomainObjectCriteria, HealthChecker, IdGenerator, RepoError,
    Repository, RepositoryContext,
};
use tessera_db::{
    define_entity, error::Result as DbResult, Criteria, CriteriaCondition, Dialect, Direction,
    Entity, InCondition, Page, Record, ReduceCondition, Refresh, RefreshCondition, Schema,
    SqlEngine, SqliteEngine, Value,
};

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
}

define_entity!(
    User {
        type_name: "com.x.User",
        table: "users",
        key: id,
        columns: {
            id: i64 => "id",
            name: String => "name",
        }
    }
);

#[derive(Debug, Clone, PartialEq)]
struct Role {
    id: i64,
    label: String,
}

define_entity!(
    Role {
        type_name: "com.x.Role",
        table: "roles",
        key: id,
        columns: {
            id: i64 => "id",
            label: String => "label",
        }
    }
);

#[derive(Debug, Clone, PartialEq)]
struct UserRole {
    id: i64,
    user_id: i64,
    role_id: i64,
}

define_entity!(
    UserRole {
        type_name: "com.x.UserRole",
        table: "user_roles",
        key: id,
        columns: {
            id: i64 => "id",
            user_id: i64 => "user_id",
            role_id: i64 => "role_id",
        }
    }
);

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: i64,
    user_id: i64,
    total: f64,
}

define_entity!(
    Order {
        type_name: "com.x.Order",
        table: "orders",
        key: id,
        columns: {
            id: i64 => "id",
            user_id: i64 => "user_id",
            total: f64 => "total",
        }
    }
);

const TABLES: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE roles (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
    "CREATE TABLE user_roles (id INTEGER PRIMARY KEY, user_id BIGINT NOT NULL, role_id BIGINT NOT NULL)",
    "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id BIGINT NOT NULL, total DOUBLE NOT NULL)",
];

struct App {
    engine: SqliteEngine,
    ctx: Arc<RepositoryContext>,
    users: Arc<Repository<User>>,
    roles: Arc<Repository<Role>>,
    user_roles: Arc<Repository<UserRole>>,
    orders: Arc<Repository<Order>>,
}

/// Builds a started context over an in-memory database with every table in place.
fn app() -> App {
    let engine = SqliteEngine::open_in_memory().unwrap();
    for sql in TABLES {
        engine.execute(User::schema(), sql, &[]).unwrap();
    }
    let ctx = RepositoryContext::builder(Arc::new(engine.clone()))
        .dialect(Dialect::Sqlite)
        .build()
        .unwrap();
    let app = App {
        users: Repository::new(&ctx).unwrap(),
        roles: Repository::new(&ctx).unwrap(),
        user_roles: Repository::new(&ctx).unwrap(),
        orders: Repository::new(&ctx).unwrap(),
        engine,
        ctx,
    };
    let report = HealthChecker::new(&app.ctx).on_started().unwrap();
    assert!(!report.is_degraded(), "{:?}", report.failures);
    app
}

fn users(ids: &[i64]) -> Vec<User> {
    ids.iter()
        .map(|&id| User {
            id,
            name: format!("user-{id}"),
        })
        .collect()
}

fn persisted_max(engine: &SqliteEngine, type_name: &str) -> Option<i64> {
    engine
        .get(IdGenerator::schema(), &Value::Text(type_name.to_string()))
        .unwrap()
        .and_then(|r| IdGenerator::from_record(&r).unwrap().max_id)
}

fn role_ids(roles: &[Role]) -> Vec<i64> {
    roles.iter().map(|r| r.id).collect()
}

#[test]
fn ids_count_up_and_are_persisted() {
    let app = app();
    assert_eq!(persisted_max(&app.engine, "com.x.User"), Some(0));

    let ids: Vec<i64> = (0..3).map(|_| app.users.create_id().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    assert!(app.ctx.drain(Duration::from_secs(5)));
    assert_eq!(persisted_max(&app.engine, "com.x.User"), Some(3));
    assert_eq!(persisted_max(&app.engine, "com.x.Role"), Some(0));
}

#[test]
fn concurrent_ids_are_distinct() {
    let app = app();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orders = app.orders.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| orders.create_id().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "id {id} issued twice");
        }
    }
    assert_eq!(seen.len(), 400);
    assert_eq!(seen.iter().max(), Some(&400));

    assert!(app.ctx.drain(Duration::from_secs(10)));
    assert_eq!(persisted_max(&app.engine, "com.x.Order"), Some(400));
}

#[test]
fn refresh_needs_a_usable_key() {
    let app = app();
    app.users.create_batch(&users(&[7])).unwrap();

    let err = app
        .users
        .refresh(&User { id: 0, name: "nobody".into() })
        .unwrap_err();
    assert!(matches!(err, RepoError::Persistence(_)));
    assert_eq!(err.to_string(), "UnSafe Refresh, try refresh_unsafe");
    assert_eq!(app.users.get(7).unwrap().unwrap().name, "user-7");

    assert!(app.users.refresh(&User { id: 7, name: "grace".into() }).unwrap());
    assert_eq!(app.users.get(7).unwrap().unwrap().name, "grace");
}

#[test]
fn conditional_refresh_needs_a_key_clause() {
    let app = app();
    app.users.create_batch(&users(&[5, 6])).unwrap();

    let zero = RefreshCondition::<User>::new(CriteriaCondition::new().eq("id", 0))
        .refresh("name", "renamed".to_string());
    let err = app.users.refresh_condition(&zero).unwrap_err();
    assert!(matches!(err, RepoError::Persistence(_)));

    let five = RefreshCondition::<User>::new(CriteriaCondition::new().eq("id", 5))
        .refresh("name", "renamed".to_string());
    assert!(app.users.refresh_condition(&five).unwrap());
    assert_eq!(app.users.get(5).unwrap().unwrap().name, "renamed");
    assert_eq!(app.users.get(6).unwrap().unwrap().name, "user-6");

    let broad = RefreshCondition::<User>::new(CriteriaCondition::new().gt("id", 0))
        .refresh("name", "everyone".to_string());
    assert!(app.users.refresh_condition(&broad).is_err());
    assert!(app.users.refresh_unsafe(&broad).unwrap());
    assert!(app.users.list().unwrap().iter().all(|u| u.name == "everyone"));
}

#[test]
fn conditional_refresh_pinned_by_target() {
    let app = app();
    app.orders
        .create_batch(&[
            Order { id: 1, user_id: 1, total: 9.5 },
            Order { id: 2, user_id: 1, total: 20.0 },
        ])
        .unwrap();

    let condition = RefreshCondition::<Order>::new(CriteriaCondition::new().eq("user_id", 1))
        .refresh("total", 0.0);
    assert!(app.orders.refresh_condition(&condition).is_err());

    let pinned = condition.with_target(Order { id: 2, user_id: 1, total: 0.0 });
    assert!(app.orders.refresh_condition(&pinned).unwrap());
    assert_eq!(app.orders.get(1).unwrap().unwrap().total, 9.5);
    assert_eq!(app.orders.get(2).unwrap().unwrap().total, 0.0);
}

#[test]
fn known_mains_through_relative() {
    let app = app();
    app.users.create_batch(&users(&[10, 20])).unwrap();
    app.roles
        .create_batch(&[
            Role { id: 100, label: "admin".into() },
            Role { id: 101, label: "editor".into() },
        ])
        .unwrap();
    app.user_roles
        .create_batch(&[
            UserRole { id: 1, user_id: 10, role_id: 100 },
            UserRole { id: 2, user_id: 10, role_id: 101 },
            UserRole { id: 3, user_id: 20, role_id: 100 },
        ])
        .unwrap();

    let criteria = DomainObjectCriteria::new("user_id")
        .known_main_ids([10i64, 20])
        .relative::<UserRole>("role_id");
    let objects: Vec<DomainObject<User, Role>> =
        app.users.list_domain_objects(&criteria).unwrap();

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].main_id(), Some(Value::Integer(10)));
    assert!(objects[0].main().is_none());
    assert_eq!(role_ids(objects[0].with_list()), vec![100, 101]);
    assert_eq!(objects[1].main_id(), Some(Value::Integer(20)));
    assert_eq!(role_ids(objects[1].with_list()), vec![100]);
}

#[test]
fn known_mains_are_distinct_and_keep_order() {
    let app = app();
    app.orders
        .create_batch(&[Order { id: 1, user_id: 2, total: 1.0 }])
        .unwrap();

    let criteria = DomainObjectCriteria::new("user_id").known_main_ids([2i64, 1, 2]);
    let objects: Vec<DomainObject<User, Order>> =
        app.users.list_domain_objects(&criteria).unwrap();

    let ids: Vec<_> = objects.iter().map(|o| o.main_id()).collect();
    assert_eq!(ids, vec![Some(Value::Integer(2)), Some(Value::Integer(1))]);
    assert_eq!(objects[0].with_list().len(), 1);
    assert!(objects[1].with_list().is_empty());
}

#[test]
fn queried_mains_with_direct_link() {
    let app = app();
    app.users.create_batch(&users(&[1, 2])).unwrap();
    app.orders
        .create_batch(&[
            Order { id: 1, user_id: 1, total: 9.5 },
            Order { id: 2, user_id: 1, total: 20.0 },
            Order { id: 3, user_id: 2, total: 4.25 },
        ])
        .unwrap();

    let criteria = DomainObjectCriteria::new("user_id")
        .criteria(Criteria::new(CriteriaCondition::new()).order_by("id", Direction::Asc));
    let objects: Vec<DomainObject<User, Order>> =
        app.users.list_domain_objects(&criteria).unwrap();

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].main(), Some(&users(&[1])[0]));
    assert_eq!(objects[0].with_list().len(), 2);
    assert_eq!(objects[1].main_id(), Some(Value::Integer(2)));
    assert_eq!(objects[1].with_list().len(), 1);
    assert_eq!(objects[1].with_list()[0].total, 4.25);
}

#[test]
fn queried_mains_through_relative() {
    let app = app();
    app.users.create_batch(&users(&[1, 2])).unwrap();
    app.roles
        .create_batch(&[Role { id: 100, label: "admin".into() }])
        .unwrap();
    app.user_roles
        .create_batch(&[UserRole { id: 1, user_id: 2, role_id: 100 }])
        .unwrap();

    let criteria = DomainObjectCriteria::new("user_id")
        .criteria(Criteria::new(CriteriaCondition::new().eq("name", "user-2".to_string())))
        .relative::<UserRole>("role_id");
    let objects: Vec<DomainObject<User, Role>> =
        app.users.list_domain_objects(&criteria).unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].main().map(|u| u.id), Some(2));
    assert_eq!(role_ids(objects[0].with_list()), vec![100]);
}

#[test]
fn domain_objects_edge_cases() {
    let app = app();
    app.users.create_batch(&users(&[1])).unwrap();

    let none = DomainObjectCriteria::new("user_id")
        .criteria(Criteria::new(CriteriaCondition::new().gt("id", 100)));
    let objects: Vec<DomainObject<User, Order>> = app.users.list_domain_objects(&none).unwrap();
    assert!(objects.is_empty());

    let unknown = DomainObjectCriteria::new("owner").known_main_ids([1i64]);
    match app.users.list_domain_objects::<Order>(&unknown) {
        Err(RepoError::Assembly(message)) => assert!(message.contains("owner")),
        other => panic!("unexpected {other:?}"),
    }

    let mapped = DomainObjectCriteria::new("user_id")
        .criteria(Criteria::result_mapped(CriteriaCondition::new(), ["id"]));
    assert!(matches!(
        app.users.list_domain_objects::<Order>(&mapped),
        Err(RepoError::Misuse(_))
    ));
}

#[test]
fn empty_in_list_returns_nothing() {
    let app = app();
    app.users.create_batch(&users(&[1, 2])).unwrap();
    let none = app.users.in_(&InCondition::new("id", Vec::<i64>::new())).unwrap();
    assert!(none.is_empty());
    let some = app.users.in_(&InCondition::new("id", [2i64])).unwrap();
    assert_eq!(some, users(&[2]));
}

/// Delegates to SQLite and counts the membership and criteria queries it runs.
struct CountingEngine {
    inner: SqliteEngine,
    in_lists: AtomicUsize,
    criteria_queries: AtomicUsize,
}

impl CountingEngine {
    fn in_lists(&self) -> usize {
        self.in_lists.load(Ordering::SeqCst)
    }

    fn criteria_queries(&self) -> usize {
        self.criteria_queries.load(Ordering::SeqCst)
    }
}

impl SqlEngine for CountingEngine {
    fn create(&self, schema: &Schema, record: &Record) -> DbResult<Value> {
        self.inner.create(schema, record)
    }

    fn create_batch(&self, schema: &Schema, records: &[Record]) -> DbResult<bool> {
        self.inner.create_batch(schema, records)
    }

    fn get(&self, schema: &Schema, id: &Value) -> DbResult<Option<Record>> {
        self.inner.get(schema, id)
    }

    fn list(&self, schema: &Schema, example: Option<&Record>) -> DbResult<Vec<Record>> {
        self.inner.list(schema, example)
    }

    fn get_one(
        &self,
        schema: &Schema,
        example: &Record,
        order_by: Option<&str>,
        direction: Direction,
    ) -> DbResult<Option<Record>> {
        self.inner.get_one(schema, example, order_by, direction)
    }

    fn remove(&self, schema: &Schema, record: &Record) -> DbResult<bool> {
        self.inner.remove(schema, record)
    }

    fn refresh(&self, schema: &Schema, record: &Record) -> DbResult<bool> {
        self.inner.refresh(schema, record)
    }

    fn refresh_condition(&self, schema: &Schema, refresh: &Refresh) -> DbResult<bool> {
        self.inner.refresh_condition(schema, refresh)
    }

    fn reduce(&self, schema: &Schema, reduce: &ReduceCondition) -> DbResult<Value> {
        self.inner.reduce(schema, reduce)
    }

    fn in_list(&self, schema: &Schema, condition: &InCondition) -> DbResult<Vec<Record>> {
        self.in_lists.fetch_add(1, Ordering::SeqCst);
        self.inner.in_list(schema, condition)
    }

    fn find(&self, schema: &Schema, criteria: &Criteria) -> DbResult<Page<Record>> {
        self.criteria_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.find(schema, criteria)
    }

    fn list_criteria(&self, schema: &Schema, criteria: &Criteria) -> DbResult<Vec<Record>> {
        self.criteria_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.list_criteria(schema, criteria)
    }

    fn refresh_cache(&self, schema: &Schema) {
        self.inner.refresh_cache(schema)
    }

    fn execute(&self, schema: &Schema, sql: &str, params: &[Value]) -> DbResult<usize> {
        self.inner.execute(schema, sql, params)
    }
}

#[test]
fn empty_lookups_issue_no_membership_query() {
    let inner = SqliteEngine::open_in_memory().unwrap();
    for sql in TABLES {
        inner.execute(User::schema(), sql, &[]).unwrap();
    }
    let engine = Arc::new(CountingEngine {
        inner,
        in_lists: AtomicUsize::new(0),
        criteria_queries: AtomicUsize::new(0),
    });
    let ctx = RepositoryContext::builder(engine.clone())
        .dialect(Dialect::Sqlite)
        .build()
        .unwrap();
    let repo = Repository::<User>::new(&ctx).unwrap();
    let _roles = Repository::<Role>::new(&ctx).unwrap();
    let _user_roles = Repository::<UserRole>::new(&ctx).unwrap();
    let _orders = Repository::<Order>::new(&ctx).unwrap();
    HealthChecker::new(&ctx).on_started().unwrap();
    repo.create_batch(&users(&[1, 2])).unwrap();

    assert!(repo.in_(&InCondition::new("id", Vec::<i64>::new())).unwrap().is_empty());
    assert_eq!(engine.in_lists(), 0);

    let no_mains = DomainObjectCriteria::new("user_id")
        .criteria(Criteria::new(CriteriaCondition::new().gt("id", 100)));
    let objects: Vec<DomainObject<User, Order>> = repo.list_domain_objects(&no_mains).unwrap();
    assert!(objects.is_empty());
    assert_eq!(engine.criteria_queries(), 1);
    assert_eq!(engine.in_lists(), 0);

    let no_relatives = DomainObjectCriteria::new("user_id")
        .known_main_ids([1i64])
        .relative::<UserRole>("role_id");
    let objects: Vec<DomainObject<User, Role>> =
        repo.list_domain_objects(&no_relatives).unwrap();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].with_list().is_empty());
    assert_eq!(engine.in_lists(), 1);

    assert_eq!(repo.in_(&InCondition::new("id", [2i64])).unwrap(), users(&[2]));
    assert_eq!(engine.in_lists(), 2);
}

#[derive(Debug, Clone)]
struct Draft {
    id: i64,
}

define_entity!(
    Draft {
        type_name: "com.x.Draft",
        table: "",
        key: id,
        columns: {
            id: i64 => "id"
        }
    }
);

#[test]
fn missing_mapping_stops_startup() {
    let engine = SqliteEngine::open_in_memory().unwrap();
    let ctx = RepositoryContext::builder(Arc::new(engine.clone()))
        .dialect(Dialect::MySql)
        .build()
        .unwrap();
    let _users = Repository::<User>::new(&ctx).unwrap();
    let _drafts = Repository::<Draft>::new(&ctx).unwrap();

    let checker = HealthChecker::new(&ctx);
    let err = checker.on_started().unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(checker.state(), BootstrapState::Aborted);

    let tables = engine
        .query("SELECT name FROM sqlite_master WHERE type = 'table'", &[])
        .unwrap();
    assert!(tables.is_empty());
}
