use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cowork::config::Config;
use cowork::engine::{Engine, ViewState};
use cowork::http::Upload;
use cowork::model::{
    Id, ReservationRequest, ReservationStatus, ResetPasswordRequest, SignUpRequest, Space, SubscriptionType,
    local_time,
};
use cowork::notify::{Notice, NoticeLevel, NotifyHub};
use cowork::{Backend, ClientError, HttpBackend, Session};

#[derive(Parser)]
#[command(name = "cowork", about = "Coworking booking client")]
struct Cli {
    /// Backend base URL, overrides COWORK_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlanArg {
    Monthly,
    Yearly,
}

impl From<PlanArg> for SubscriptionType {
    fn from(p: PlanArg) -> Self {
        match p {
            PlanArg::Monthly => SubscriptionType::Monthly,
            PlanArg::Yearly => SubscriptionType::Yearly,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Confirmed,
    Cancelled,
}

impl From<StatusArg> for ReservationStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Pending => ReservationStatus::Pending,
            StatusArg::Confirmed => ReservationStatus::Confirmed,
            StatusArg::Cancelled => ReservationStatus::Cancelled,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long, env = "COWORK_EMAIL")]
        email: String,
        #[arg(long, env = "COWORK_PASSWORD")]
        password: String,
    },
    Logout,
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Update the signed-in user's profile.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Profile picture to upload.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },
    /// List spaces.
    Spaces {
        #[arg(long)]
        open: bool,
    },
    /// Days that cannot be booked on a space.
    BlockedDates {
        #[arg(long)]
        space: Id,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Subscribe the signed-in user to an open space.
    Subscribe {
        #[arg(long)]
        space: Id,
        #[arg(long, value_enum)]
        plan: PlanArg,
    },
    Unsubscribe {
        #[arg(long)]
        id: Id,
    },
    /// Show the signed-in user's subscription.
    Subscription,
    /// Book a space for the signed-in user.
    Reserve {
        #[arg(long)]
        space: Id,
        #[arg(long, value_parser = local_time::parse)]
        start: NaiveDateTime,
        #[arg(long, value_parser = local_time::parse)]
        end: NaiveDateTime,
        #[arg(long, default_value = "0")]
        amount: Decimal,
    },
    /// Change a reservation's status (receptionist).
    SetStatus {
        #[arg(long)]
        reservation: Id,
        #[arg(long, value_enum)]
        status: StatusArg,
    },
    /// Payment and invoice overview (receptionist).
    Dashboard {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    ValidatePayment {
        #[arg(long)]
        payment: Id,
    },
    /// Generate the invoice for a payment and save its PDF.
    Invoice {
        #[arg(long)]
        payment: Id,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    cowork::observability::init(config.metrics_port)?;

    let hub = Arc::new(NotifyHub::new());
    let mut notices = hub.subscribe_notices();
    let session = Arc::new(Session::init(config.session_file.clone(), hub));
    let http = Arc::new(HttpBackend::new(
        &config.api_url,
        Duration::from_secs(config.http_timeout_secs),
        session.clone(),
    )?);
    let engine = Engine::new(http.clone(), session.clone());
    info!("backend: {}", http.base_url());

    let result = run(cli.command, &engine, &http).await;
    drain_notices(&mut notices);
    result.map_err(Into::into)
}

async fn run(command: Command, engine: &Engine, http: &HttpBackend) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let user = http.sign_in(&email, &password).await?;
            println!("signed in as {} ({:?})", user.email, user.role);
        }
        Command::Logout => http.logout(),
        Command::Signup {
            name,
            email,
            password,
            phone,
        } => {
            http.sign_up(&SignUpRequest {
                name,
                email: email.clone(),
                password,
                phone,
            })
            .await?;
            println!("account created for {email}, sign in to continue");
        }
        Command::Profile { name, phone, image } => {
            let user = signed_in(engine)?;
            let mut profile = engine.hub().latest_profile().unwrap_or_else(|| user.profile());
            if name.is_some() {
                profile.name = name;
            }
            if phone.is_some() {
                profile.phone = phone;
            }
            let upload = image.map(|path| read_upload(&path)).transpose()?;
            let updated = http.update_profile(&profile, upload).await?;
            println!("profile updated for {}", updated.email);
        }
        Command::ForgotPassword { email } => {
            http.forgot_password(&email).await?;
            println!("reset link sent to {email}");
        }
        Command::ResetPassword { token, password } => {
            http.reset_password(&ResetPasswordRequest {
                token,
                new_password: password,
            })
            .await?;
            println!("password updated");
        }
        Command::Spaces { open } => {
            let spaces = if open { http.open_spaces().await? } else { http.spaces().await? };
            for s in spaces {
                println!(
                    "{:>4}  {:<24} {:?}  cap {:<3} {}{}",
                    s.id.unwrap_or_default(),
                    s.name,
                    s.kind,
                    s.capacity,
                    s.price,
                    if s.active { "" } else { "  (inactive)" }
                );
            }
        }
        Command::BlockedDates { space, from, to } => {
            let blocked = engine.blocked_dates(space).await;
            let from = from.unwrap_or(blocked.today);
            let to = to.unwrap_or_else(|| from + chrono::Days::new(30));
            for day in from.iter_days().take_while(|d| *d <= to) {
                if blocked.unavailable.contains(&day) {
                    println!("{day}  unavailable");
                } else if blocked.reserved.contains(&day) {
                    println!("{day}  reserved");
                } else if blocked.is_blocked(day) {
                    println!("{day}  past");
                }
            }
        }
        Command::Subscribe { space, plan } => {
            let user = signed_in(engine)?;
            let space = find_space(http, space).await?;
            let created = engine.subscribe(plan.into(), &user.profile(), &space).await?;
            println!(
                "subscribed: {} at {} until {}",
                created.kind, created.price, created.end_date
            );
        }
        Command::Unsubscribe { id } => {
            let user = signed_in(engine)?;
            engine.unsubscribe(user.id, id).await?;
        }
        Command::Subscription => {
            let user = signed_in(engine)?;
            match engine.active_subscription(user.id).await? {
                Some(s) => println!(
                    "#{} {} on space {} from {} to {}",
                    s.id.unwrap_or_default(),
                    s.kind,
                    s.space_id,
                    s.start_date,
                    s.end_date
                ),
                None => println!("no subscription"),
            }
        }
        Command::Reserve {
            space,
            start,
            end,
            amount,
        } => {
            let user = signed_in(engine)?;
            let space = find_space(http, space).await?;
            let request = ReservationRequest {
                user: user.profile(),
                space,
                start,
                end,
                amount,
            };
            let created = engine.create_reservation(&request).await?;
            println!(
                "reservation #{} {:?} from {} to {}",
                created.id.unwrap_or_default(),
                created.status,
                created.start_date,
                created.end_date
            );
        }
        Command::SetStatus { reservation, status } => {
            let current = http
                .reservations()
                .await?
                .into_iter()
                .find(|r| r.id == Some(reservation))
                .ok_or_else(|| ClientError::NotFound(format!("reservation {reservation}")))?;
            let saved = engine.set_reservation_status(&current, status.into()).await?;
            println!("reservation #{reservation} is now {:?}", saved.status);
        }
        Command::Dashboard { page } => {
            let mut state = load_dashboard(engine).await?;
            let Some(d) = state.dashboard_mut() else {
                return Ok(());
            };
            let (pending, validated) = (d.pending_payments().len(), d.validated_payments().len());
            let (unpaid, invoices) = (d.unpaid_reservations().len(), d.invoices.len());
            d.cursors.pending_payments.go_to(page, pending);
            d.cursors.validated_payments.go_to(page, validated);
            d.cursors.unpaid_reservations.go_to(page, unpaid);
            d.cursors.invoices.go_to(page, invoices);
            let d = &*d;

            println!("pending payments ({}):", d.pending_payments().len());
            for p in d.pending_payments_page() {
                println!("  #{} {} {}", p.id.unwrap_or_default(), p.target.label(), p.amount);
            }
            println!("validated payments ({}):", d.validated_payments().len());
            for p in d.validated_payments_page() {
                let invoiced = p.id.and_then(|id| d.invoice_for(id)).is_some();
                println!(
                    "  #{} {} {}{}",
                    p.id.unwrap_or_default(),
                    p.target.label(),
                    p.amount,
                    if invoiced { "  invoiced" } else { "" }
                );
            }
            println!("unpaid reservations ({}):", d.unpaid_reservations().len());
            for r in d.unpaid_reservations_page() {
                println!(
                    "  #{} {} {} → {}",
                    r.id.unwrap_or_default(),
                    r.space_name.as_deref().unwrap_or("?"),
                    r.start_date,
                    r.end_date
                );
            }
            println!("invoices ({}):", d.invoices.len());
            for i in d.invoices_page() {
                println!(
                    "  #{} payment #{} to {}",
                    i.id.unwrap_or_default(),
                    i.payment_id,
                    i.recipient_email
                );
            }
        }
        Command::ValidatePayment { payment } => {
            let mut state = load_dashboard(engine).await?;
            if let Some(d) = state.dashboard_mut() {
                engine.validate_payment(d, payment).await?;
                println!("payment #{payment} validated");
            }
        }
        Command::Invoice { payment, out } => {
            let mut state = load_dashboard(engine).await?;
            if let Some(d) = state.dashboard_mut() {
                let (invoice, pdf) = engine.generate_invoice(d, payment).await?;
                let invoice_id = invoice.id.unwrap_or_default();
                let out = out.unwrap_or_else(|| PathBuf::from(format!("facture-{invoice_id}.pdf")));
                std::fs::write(&out, &pdf)?;
                println!(
                    "invoice #{invoice_id} for {} saved to {}",
                    invoice.recipient_email,
                    out.display()
                );
            }
        }
    }
    Ok(())
}

fn read_upload(path: &std::path::Path) -> Result<Upload, ClientError> {
    let bytes = std::fs::read(path)?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(Upload {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into()),
        content_type: content_type.into(),
        bytes: bytes.into(),
    })
}

fn signed_in(engine: &Engine) -> Result<cowork::model::CurrentUser, ClientError> {
    engine.session().current_user().ok_or(ClientError::Unauthorized)
}

async fn find_space(http: &HttpBackend, id: Id) -> Result<Space, ClientError> {
    http.spaces()
        .await?
        .into_iter()
        .find(|s| s.id == Some(id))
        .ok_or_else(|| ClientError::NotFound(format!("space {id}")))
}

/// Load the dashboard, cancelled by ctrl-c.
async fn load_dashboard(engine: &Engine) -> Result<ViewState, ClientError> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });
    match engine.load_dashboard(&cancel).await {
        ViewState::Failed(message) => Err(ClientError::Backend { status: 0, message }),
        ViewState::Cancelled => Err(ClientError::Cancelled),
        state => Ok(state),
    }
}

fn drain_notices(rx: &mut broadcast::Receiver<Notice>) {
    while let Ok(Notice { level, message }) = rx.try_recv() {
        match level {
            NoticeLevel::Error => eprintln!("error: {message}"),
            NoticeLevel::Success => eprintln!("{message}"),
        }
    }
}
