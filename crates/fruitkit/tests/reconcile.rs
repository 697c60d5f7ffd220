//! End-to-end reconciliation runs against in-memory resource classes
//!
//! Every class is backed by its own `Store`, which plays the live system:
//! deploy writes a record, undeploy removes it, and the live fetch reads the
//! records back.

use async_trait::async_trait;
use fruitkit::{
    ArtifactCompiler, ArtifactDescriptor, AutoConfirm, AutoDecline, CollectContext, Collection,
    Error, ExecuteSummary, LiveResources, NoProgress, Outputs, ProgressCallback, PropValue,
    ResourceClass, SourceCompiler, Step, collect, execute_simple, props, reconcile,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Store {
    records: Arc<Mutex<LiveResources>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Store {
    fn record(&self, name: &str) -> serde_json::Map<String, Value> {
        self.records.lock().unwrap()[name].clone()
    }

    fn names(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn class(store: &Store, kind: &str, required: &[&str], post_deploy: &[&str]) -> Arc<ResourceClass> {
    let post: Vec<String> = post_deploy.iter().map(ToString::to_string).collect();
    let (deploy_store, undeploy_store, fetch_store) = (store.clone(), store.clone(), store.clone());

    ResourceClass::builder(kind)
        .required_props(required.iter().copied())
        .post_deploy_props(post_deploy.iter().copied())
        .deploy(move |resource| {
            let store = deploy_store.clone();
            let post = post.clone();
            async move {
                let mut record = resource.to_json().as_object().cloned().unwrap_or_default();
                let mut outputs = Outputs::new();
                for prop in &post {
                    outputs.insert(prop.clone(), json!(format!("{prop}:{}", resource.name())));
                }
                record.extend(outputs.clone());
                store
                    .records
                    .lock()
                    .unwrap()
                    .insert(resource.name().to_string(), record);
                store.log.lock().unwrap().push(format!("deploy {}", resource.name()));
                Ok(outputs)
            }
        })
        .undeploy(move |resource| {
            let store = undeploy_store.clone();
            async move {
                store.records.lock().unwrap().shift_remove(resource.name());
                store
                    .log
                    .lock()
                    .unwrap()
                    .push(format!("undeploy {}", resource.name()));
                Ok(())
            }
        })
        .fetch_currently_deployed(move || {
            let store = fetch_store.clone();
            async move { Ok(store.records.lock().unwrap().clone()) }
        })
        .build()
        .unwrap()
}

/// A function reading from a bucket through a post-deploy reference
struct Fixture {
    buckets: Store,
    functions: Store,
    bucket: Arc<ResourceClass>,
    function: Arc<ResourceClass>,
}

impl Fixture {
    fn new() -> Self {
        let buckets = Store::default();
        let functions = Store::default();
        let bucket = class(&buckets, "bucket", &["region"], &["arn"]);
        let function = class(&functions, "function", &["code", "bucket_arn"], &["url"]);
        Self {
            buckets,
            functions,
            bucket,
            function,
        }
    }

    /// Declare `data` (bucket) and `handler` (function), the function class
    /// registered first so live state lists the handler before its bucket
    fn collection(&self, region: &str, code: &str) -> Collection {
        collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
            ctx.register_class(&self.function);
            let data = ctx.describe("data", &self.bucket, props([("region", region)]))?;
            let arn = data
                .post_deploy_prop("arn")?
                .map(|v| json!(format!("bucket={}", v.as_str().unwrap_or_default())));
            ctx.describe(
                "handler",
                &self.function,
                props([
                    ("code", PropValue::from(json!(code))),
                    ("bucket_arn", PropValue::from(arn)),
                ]),
            )?;
            Ok(())
        })
        .unwrap()
    }

    /// Only the classes, no resources: everything live gets removed
    fn empty(&self) -> Collection {
        collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
            ctx.register_class(&self.function);
            ctx.register_class(&self.bucket);
            Ok(())
        })
        .unwrap()
    }

    fn log(&self) -> Vec<String> {
        let mut log = self.buckets.log();
        log.extend(self.functions.log());
        log
    }
}

fn rendered(steps: &[Step]) -> Vec<String> {
    steps.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn first_deploy_then_plan_settles() {
    let fixture = Fixture::new();

    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    assert_eq!(rendered(&steps), vec!["deploy data", "deploy handler"]);

    let summary = execute_simple(&steps).await.unwrap();
    assert_eq!(summary.deployed, 2);
    assert_eq!(
        fixture.functions.record("handler")["bucket_arn"],
        json!("bucket=arn:data")
    );

    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    assert!(steps.is_empty(), "unexpected steps: {steps:?}");
}

#[tokio::test]
async fn unchanged_dependency_is_resolved_from_live_state() {
    let fixture = Fixture::new();
    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    execute_simple(&steps).await.unwrap();

    // Only the function changes; the bucket stays and its arn comes from live state
    let declared = fixture.collection("eu", "v2");
    let steps = reconcile::plan(&declared, &SourceCompiler).await.unwrap();
    assert_eq!(rendered(&steps), vec!["undeploy handler", "deploy handler"]);
    assert!(declared.resources["data"].is_deployed());

    execute_simple(&steps).await.unwrap();
    let record = fixture.functions.record("handler");
    assert_eq!(record["code"], json!("v2"));
    assert_eq!(record["bucket_arn"], json!("bucket=arn:data"));
}

#[tokio::test]
async fn deploy_callbacks_run_when_an_unchanged_resource_is_adopted() {
    let fixture = Fixture::new();
    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    execute_simple(&steps).await.unwrap();

    let declared = fixture.collection("eu", "v1");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    declared.resources["data"].on_deploy(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let steps = reconcile::plan(&declared, &SourceCompiler).await.unwrap();
    assert!(steps.is_empty());
    execute_simple(&steps).await.unwrap();
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(declared.resources["data"].is_deployed());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_dependency_redeploys_dependents_after_it() {
    let fixture = Fixture::new();
    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    execute_simple(&steps).await.unwrap();

    let steps = reconcile::plan(&fixture.collection("us", "v1"), &SourceCompiler)
        .await
        .unwrap();
    assert_eq!(
        rendered(&steps),
        vec![
            "undeploy data",
            "deploy data",
            "undeploy handler",
            "deploy handler"
        ]
    );

    execute_simple(&steps).await.unwrap();
    assert_eq!(fixture.buckets.record("data")["region"], json!("us"));
}

#[tokio::test]
async fn removed_declarations_are_undeployed() {
    let fixture = Fixture::new();
    let steps = reconcile::plan(&fixture.collection("eu", "v1"), &SourceCompiler)
        .await
        .unwrap();
    execute_simple(&steps).await.unwrap();

    let steps = reconcile::plan(&fixture.empty(), &SourceCompiler)
        .await
        .unwrap();
    assert_eq!(rendered(&steps), vec!["undeploy handler", "undeploy data"]);

    let summary = execute_simple(&steps).await.unwrap();
    assert_eq!(summary.undeployed, 2);
    assert!(fixture.buckets.names().is_empty());
    assert!(fixture.functions.names().is_empty());
    assert_eq!(
        fixture.log(),
        vec!["deploy data", "undeploy data", "deploy handler", "undeploy handler"]
    );
}

#[tokio::test]
async fn live_names_shared_between_classes_collide() {
    let shared = Store::default();
    shared
        .records
        .lock()
        .unwrap()
        .insert("existingFruit".into(), json!({"x": 1}).as_object().cloned().unwrap());
    let first = class(&shared, "first", &["x"], &[]);
    let second = class(&shared, "second", &["x"], &[]);

    let declared = collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
        ctx.register_class(&first);
        ctx.register_class(&second);
        Ok(())
    })
    .unwrap();

    let err = reconcile::plan(&declared, &SourceCompiler).await.unwrap_err();
    assert_eq!(err.to_string(), "resources already exist: [\"existingFruit\"]");
}

#[tokio::test]
async fn fetch_failures_name_the_class() {
    let broken = ResourceClass::builder("broken")
        .deploy(|_| async { Ok(Outputs::new()) })
        .fetch_currently_deployed(|| async { anyhow::bail!("api unreachable") })
        .build()
        .unwrap();
    let declared = collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
        ctx.register_class(&broken);
        Ok(())
    })
    .unwrap();

    let err = reconcile::plan(&declared, &SourceCompiler).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { ref class, .. } if class == "broken"));
}

/// Upper-cases the source and counts invocations
#[derive(Default)]
struct CountingCompiler {
    calls: AtomicUsize,
}

#[async_trait]
impl ArtifactCompiler for CountingCompiler {
    async fn compile(&self, artifact: &ArtifactDescriptor, context: &Value) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(context.get("script").is_some());
        Ok(artifact.source().to_uppercase())
    }
}

fn script_collection(class: &Arc<ResourceClass>, source: &str) -> Collection {
    collect(&|ctx: &mut CollectContext| -> fruitkit::Result<()> {
        ctx.describe(
            "script",
            class,
            props([("body", ArtifactDescriptor::new(source).with_file("/src/script.sh"))]),
        )?;
        Ok(())
    })
    .unwrap()
}

#[tokio::test]
async fn artifacts_compile_once_and_compare_by_output() {
    let store = Store::default();
    let scripts = class(&store, "script", &["body"], &[]);
    let compiler = CountingCompiler::default();

    let declared = script_collection(&scripts, "echo hi");
    let steps = reconcile::plan(&declared, &compiler).await.unwrap();
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(declared.resources["script"].value("body").unwrap(), json!("ECHO HI"));
    execute_simple(&steps).await.unwrap();

    // The live record carries the descriptor, which is compiled again
    assert_eq!(store.record("script")["body"]["_artifact"], json!(true));
    let steps = reconcile::plan(&script_collection(&scripts, "echo hi"), &compiler)
        .await
        .unwrap();
    assert!(steps.is_empty());
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 3);

    let steps = reconcile::plan(&script_collection(&scripts, "echo bye"), &compiler)
        .await
        .unwrap();
    assert_eq!(rendered(&steps), vec!["undeploy script", "deploy script"]);
}

/// Records the plan it is shown
#[derive(Default)]
struct PlanRecorder {
    planned: Vec<String>,
}

impl ProgressCallback for PlanRecorder {
    fn on_plan(&mut self, steps: &[Step]) {
        self.planned = rendered(steps);
    }
    fn on_run_start(&mut self, _count: usize) {}
    fn on_step_start(&mut self, _step: &Step) {}
    fn on_step_complete(&mut self, _step: &Step) {}
    fn on_step_failed(&mut self, _step: &Step, _error: &Error) {}
    fn on_run_complete(&mut self, _summary: &ExecuteSummary) {}
}

#[tokio::test]
async fn declined_deploy_executes_nothing() {
    let fixture = Fixture::new();
    let mut progress = PlanRecorder::default();
    let summary = reconcile::deploy(
        &fixture.collection("eu", "v1"),
        &SourceCompiler,
        &mut progress,
        &mut AutoDecline,
    )
    .await
    .unwrap();

    assert_eq!(progress.planned, vec!["deploy data", "deploy handler"]);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.total_changes(), 0);
    assert!(fixture.log().is_empty());
}

#[tokio::test]
async fn confirmed_deploy_reconciles() {
    let fixture = Fixture::new();
    let summary = reconcile::deploy(
        &fixture.collection("eu", "v1"),
        &SourceCompiler,
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .await
    .unwrap();
    assert_eq!(summary.deployed, 2);

    let summary = reconcile::deploy(
        &fixture.collection("eu", "v1"),
        &SourceCompiler,
        &mut NoProgress,
        &mut AutoConfirm,
    )
    .await
    .unwrap();
    assert_eq!(summary.total(), 0);
}
