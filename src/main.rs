mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;

use services::commit_aggregation::CommitAggregator;
use services::commit_check::CommitCheckService;
use services::git_platforms::GitHubClient;
use services::language_stats::LanguageStatsService;
use services::streak_cache::StreakService;
use services::streak_store::{MemoryStreakStore, SeaOrmStreakStore, StreakStore};
use utils::clock::SystemClock;
use utils::{config::Config, db::establish_connection};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    // Initialize logger with default level if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🔥 commit-streak Server");
    println!("=================================================");

    let config = Config::from_env().context("Failed to load configuration")?;
    let host = config.host.clone();
    let port = config.port;

    println!("📝 Configuration loaded:");
    println!(
        "   - Database: {}",
        config
            .database_url
            .as_deref()
            .map(|url| url.split('@').last().unwrap_or("***"))
            .unwrap_or("in-memory (DATABASE_URL not set)")
    );
    println!("   - Host: {}", host);
    println!("   - Port: {}", port);
    println!("   - GitHub API: {}", config.github_api_url);
    println!(
        "   - Repositories: {} listed, {} scanned, {} for today checks",
        config.streak.repo_list_size,
        config.streak.repos_to_scan(),
        config.streak.today_check_max_repos
    );
    println!(
        "   - Lookback: {} months, cache TTL: {}h, fetch concurrency: {}",
        config.streak.lookback_months, config.streak.cache_ttl_hours, config.streak.fetch_concurrency
    );
    println!(
        "   - Log level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    );

    let store: Arc<dyn StreakStore> = match &config.database_url {
        Some(database_url) => {
            print!("🔌 Connecting to database... ");
            let db = establish_connection(database_url)
                .await
                .context("Failed to connect to database")?;
            println!("✅ Connected!");

            let store = SeaOrmStreakStore::new(db);
            store
                .ensure_schema()
                .await
                .context("Failed to create streak_records table")?;
            log::info!("Database connection established");
            Arc::new(store)
        }
        None => {
            log::warn!("DATABASE_URL not set; streaks are cached in memory only");
            Arc::new(MemoryStreakStore::new())
        }
    };

    let github = GitHubClient::new(&config.github_api_url, config.http_timeout_secs)
        .context("Failed to build GitHub client")?;
    let aggregator = Arc::new(CommitAggregator::new(
        Arc::new(github),
        Arc::new(SystemClock),
        config.streak.clone(),
    ));

    let streak_service = web::Data::new(StreakService::new(aggregator.clone(), store));
    let commit_service = web::Data::new(CommitCheckService::new(aggregator.clone()));
    let language_service = web::Data::new(LanguageStatsService::new(aggregator));

    println!("🌐 Starting HTTP server at http://{}:{}", host, port);
    println!("📍 Available endpoints:");
    println!("   - GET  http://{}:{}/api/streak/{{username}}", host, port);
    println!("   - POST http://{}:{}/api/streak/{{username}}/refresh (token required)", host, port);
    println!("   - POST http://{}:{}/api/streak/{{username}}/invalidate (token required)", host, port);
    println!("   - GET  http://{}:{}/api/commits/{{username}}/today", host, port);
    println!("   - GET  http://{}:{}/api/commits/{{username}}/calendar", host, port);
    println!("   - GET  http://{}:{}/api/languages/{{username}}", host, port);
    println!("   - GET  http://{}:{}/api/health", host, port);
    println!("=================================================");

    log::info!("Server started at http://{}:{}", host, port);

    let frontend_url = config.frontend_url.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(streak_service.clone())
            .app_data(commit_service.clone())
            .app_data(language_service.clone())
            .wrap(Logger::default())
            .wrap(cors) // CORS must be wrapped AFTER Logger to ensure headers are added to all responses
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health::health_check))
                    .route(
                        "/languages/{username}",
                        web::get().to(handlers::languages::get_languages),
                    )
                    .service(
                        web::scope("/streak")
                            .route("/{username}", web::get().to(handlers::streak::get_streak))
                            .route(
                                "/{username}/refresh",
                                web::post().to(handlers::streak::refresh_streak),
                            )
                            .route(
                                "/{username}/invalidate",
                                web::post().to(handlers::streak::invalidate_streak),
                            ),
                    )
                    .service(
                        web::scope("/commits")
                            .route("/{username}/today", web::get().to(handlers::commits::get_today))
                            .route(
                                "/{username}/calendar",
                                web::get().to(handlers::commits::get_calendar),
                            ),
                    ),
            )
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;

    Ok(())
}
