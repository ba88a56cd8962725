use crate::cli::ServeArgs;
use crate::infra::{
    spawn_reaper, AppState, FsResumeStore, InMemoryApplicationRepository, OutboxNotifier,
};
use crate::routes::with_operational_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use career_intake::config::{AppConfig, IntakeConfig};
use career_intake::error::AppError;
use career_intake::intake::{
    application_router, ApplicationPayload, ApplicationWorkflow, CloudDeveloperApplication,
    DeveloperApplication, InternApplication,
};
use career_intake::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

type TrackWorkflow<P> =
    ApplicationWorkflow<P, InMemoryApplicationRepository<P>, FsResumeStore, OutboxNotifier>;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let resumes = Arc::new(FsResumeStore::new(
        &config.intake.upload_temp_dir,
        &config.intake.upload_dir,
    ));
    resumes.prepare()?;
    let notifier = Arc::new(OutboxNotifier::default());

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        resumes: resumes.clone(),
    };

    let interns = track_workflow::<InternApplication>(&config.intake, &resumes, &notifier);
    let developers = track_workflow::<DeveloperApplication>(&config.intake, &resumes, &notifier);
    let cloud = track_workflow::<CloudDeveloperApplication>(&config.intake, &resumes, &notifier);

    if let Some(every) = config.intake.reaper_interval {
        spawn_reaper(interns.clone(), every);
        spawn_reaper(developers.clone(), every);
        spawn_reaper(cloud.clone(), every);
        info!(interval_secs = every.as_secs(), "expired application reaper started");
    }

    let tracks = Router::new()
        .merge(application_router(interns))
        .merge(application_router(developers))
        .merge(application_router(cloud));
    let app = with_operational_routes(tracks)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "career intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn track_workflow<P: ApplicationPayload>(
    intake: &IntakeConfig,
    resumes: &Arc<FsResumeStore>,
    notifier: &Arc<OutboxNotifier>,
) -> Arc<TrackWorkflow<P>> {
    Arc::new(ApplicationWorkflow::new(
        Arc::new(InMemoryApplicationRepository::default()),
        resumes.clone(),
        notifier.clone(),
        intake.assessment_links.clone(),
    ))
}
