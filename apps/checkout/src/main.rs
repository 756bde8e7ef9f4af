use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use checkout::{
    CheckoutWizard, ItemField, QuantitySelection, SubmissionPhase, SubmitError, VerifiedBuyer,
    WizardStep,
};
use clap::Parser;
use server_api::config::{build_context, load_settings};
use shared::{
    catalog::find_product,
    domain::ShirtSize,
    protocol::{BuyerForm, ItemOutcome, SubmissionStatus},
};
use storage::ProofUpload;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEGREES: [&str; 5] = ["B.Tech", "M.Tech", "PhD", "MSc", "ITEP"];
const HOSTELS: [&str; 6] = ["BHR", "MHR", "RHR", "SHR", "GHR", "Sangam"];
const BACK: &str = "back";

/// Walks one order through the checkout wizard on the terminal and submits
/// it to the configured backend.
#[derive(Parser, Debug)]
struct Cli {
    /// Product id; unknown ids fall back to the first catalog entry.
    #[arg(long)]
    product: Option<String>,
    /// 1, or 5 for the buy-5-get-1 promotion.
    #[arg(long)]
    quantity: Option<u32>,
    /// Payment screenshot to attach without prompting.
    #[arg(long)]
    proof: Option<PathBuf>,
}

struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    fn say(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.output, "{}", line.as_ref())?;
        Ok(())
    }

    fn ask(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed, checkout abandoned");
        }
        Ok(line.trim().to_string())
    }

    fn ask_choice(&mut self, label: &str, choices: &[&str]) -> Result<String> {
        loop {
            let answer = self.ask(&format!("{label} [{}]", choices.join("/")))?;
            if let Some(choice) = choices.iter().find(|c| c.eq_ignore_ascii_case(&answer)) {
                return Ok(choice.to_string());
            }
            self.say(format!("please pick one of {}", choices.join(", ")))?;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let settings = load_settings()?;
    let ctx = build_context(&settings).await?;
    let stdin = io::stdin();
    let mut console = Console {
        input: stdin.lock(),
        output: io::stdout(),
    };

    console.say("Products:")?;
    for product in ctx.catalog.iter() {
        console.say(format!("  {:<12} {} - Rs.{}", product.id, product.name, product.price))?;
    }
    let product_id = match cli.product {
        Some(id) => id,
        None => console.ask("Product id")?,
    };
    let product = find_product(&ctx.catalog, &product_id)
        .cloned()
        .context("the catalog is empty")?;
    console.say(format!("Selected {} (Rs.{} each)", product.name, product.price))?;

    let mut selection = QuantitySelection::default();
    let mut requested = cli.quantity;
    loop {
        let quantity = match requested.take() {
            Some(quantity) => quantity,
            None => match console.ask("Quantity (1 or 5)")?.parse() {
                Ok(quantity) => quantity,
                Err(_) => continue,
            },
        };
        match selection.select(quantity) {
            Ok(newly_applied) => {
                if newly_applied {
                    if let Some(notice) = selection.promotion_notice() {
                        console.say(notice)?;
                    }
                }
                break;
            }
            Err(err) => console.say(err.to_string())?,
        }
    }

    let buyer = read_buyer(&mut console, &settings.email_domain)?;
    let mut wizard = CheckoutWizard::new(product, selection, buyer);
    debug!(order_id = %wizard.order_id(), "wizard started");

    let payee = settings.payee();
    let mut proof_path = cli.proof;
    while wizard.phase() != SubmissionPhase::Submitted {
        console.say(format!(
            "\n-- step {} of {} --",
            wizard.step_index() + 1,
            wizard.total_steps()
        ))?;
        match wizard.current_step() {
            WizardStep::Welcome => {
                console.say(format!(
                    "Order {}: {} x {}. Type '{BACK}' at any prompt to return to the previous step.",
                    wizard.order_id(),
                    wizard.product().name,
                    wizard.quantity()
                ))?;
                console.ask("Press enter to start")?;
                wizard.next()?;
            }
            WizardStep::Item { index } => {
                if !edit_item(&mut console, &mut wizard, index)? {
                    wizard.prev();
                    continue;
                }
                if let Err(err) = wizard.next() {
                    console.say(err.to_string())?;
                }
            }
            WizardStep::Summary => {
                console.say(wizard.summary().render_text())?;
                if console.ask("Press enter to pay")? == BACK {
                    wizard.prev();
                } else {
                    wizard.next()?;
                }
            }
            WizardStep::Payment => {
                let payment = wizard.payment_request(&payee);
                console.say(format!("Pay Rs.{} to {} ({})", payment.amount, payment.payee_name, payment.payee_id))?;
                console.say(format!("Memo: {}", payment.memo))?;
                console.say(format!("UPI link: {}", payment.upi_uri()))?;

                let path = match proof_path.take() {
                    Some(path) => path,
                    None => {
                        let answer = console.ask("Path to the payment screenshot")?;
                        if answer == BACK {
                            wizard.prev();
                            continue;
                        }
                        PathBuf::from(answer)
                    }
                };
                match read_proof(&path).await {
                    Ok(proof) => {
                        if let Err(err) = wizard.attach_proof(proof) {
                            console.say(err.to_string())?;
                            continue;
                        }
                    }
                    Err(err) => {
                        console.say(format!("{err:#}"))?;
                        continue;
                    }
                }

                console.say("Submitting...")?;
                match wizard.submit(&ctx.checkout).await {
                    Ok(_) => {}
                    Err(SubmitError::Upload { message }) => {
                        console.say(format!("Upload failed, nothing was saved: {message}"))?;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    let Some(report) = wizard.report() else {
        bail!("submission finished without a report");
    };
    console.say(format!("\nOrder {} submitted.", report.order_id))?;
    for outcome in &report.outcomes {
        match outcome {
            ItemOutcome::Persisted { index, document_id } => {
                console.say(format!("  item #{} saved ({document_id})", index + 1))?;
            }
            ItemOutcome::Failed { index, message } => {
                console.say(format!("  item #{} NOT saved: {message}", index + 1))?;
            }
        }
    }
    if report.status() != SubmissionStatus::Complete {
        console.say("Some items could not be saved; please contact the organisers with your order id.")?;
    }
    console.say(format!(
        "Track it at {}",
        ctx.checkout.tracking_url(&report.order_id)
    ))?;
    Ok(())
}

fn read_buyer<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    email_domain: &str,
) -> Result<VerifiedBuyer> {
    loop {
        let form = BuyerForm {
            name: console.ask("Full name")?,
            roll_number: console.ask("Roll number")?,
            degree: console.ask_choice("Degree", &DEGREES)?,
            year: console.ask_choice("Year", &["1", "2", "3", "4", "5"])?,
            hostel: console.ask_choice("Hostel", &HOSTELS)?,
            is_member: Some(console.ask_choice("WebnD member", &["yes", "no"])? == "yes"),
        };
        match VerifiedBuyer::from_form(&form, email_domain) {
            Ok(buyer) => {
                console.say(format!("Confirmation will be sent to {}", buyer.email))?;
                return Ok(buyer);
            }
            Err(err) => console.say(err.to_string())?,
        }
    }
}

/// Returns `false` when the buyer asked to go back.
fn edit_item<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    wizard: &mut CheckoutWizard,
    index: usize,
) -> Result<bool> {
    console.say(format!("T-shirt #{} of {}", index + 1, wizard.quantity()))?;

    let name = console.ask("Name to print")?;
    if name == BACK {
        return Ok(false);
    }
    wizard.update_item(index, ItemField::PrintedName(name))?;

    let sizes: Vec<&str> = ShirtSize::ALL.iter().map(|size| size.as_str()).collect();
    let size: ShirtSize = console.ask_choice("Size", &sizes)?.parse()?;
    wizard.update_item(index, ItemField::Size(size))?;

    if index == 0 {
        let position = console.ask("Position to print (optional)")?;
        wizard.update_item(index, ItemField::Position(position))?;
    }
    Ok(true)
}

async fn read_proof(path: &Path) -> Result<ProofUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("payment-proof")
        .to_string();
    Ok(ProofUpload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}
