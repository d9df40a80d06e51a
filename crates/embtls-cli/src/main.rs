use clap::{Parser, Subcommand};

mod genrsa;
mod s_client;
mod s_server;
mod verify;
mod x509cmd;

/// embtls command-line tool for certificates, keys and SSLv3/TLS 1.0 connections.
#[derive(Parser)]
#[command(name = "embtls")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display X.509 certificates.
    X509 {
        /// Input PEM or DER file.
        #[arg(short, long)]
        input: String,
        /// Print every field of every certificate.
        #[arg(short, long)]
        text: bool,
    },
    /// Verify a certificate chain against trusted CAs.
    Verify {
        /// Trusted CA certificates.
        #[arg(long)]
        ca_file: String,
        /// Host name the leaf must match.
        #[arg(long)]
        host: Option<String>,
        /// Certificate file, leaf first, optionally followed by intermediates.
        cert: String,
    },
    /// Generate an RSA private key (PKCS#1 PEM).
    Genrsa {
        /// Key size in bits.
        #[arg(short, long, default_value_t = 2048)]
        bits: usize,
        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Connect to a server and run a simple request.
    SClient {
        /// host:port to connect to.
        connect: String,
        /// Trusted CA certificates. Without them the server is not verified.
        #[arg(long)]
        ca_file: Option<String>,
        /// Cipher suite to offer, by name (repeatable).
        #[arg(long)]
        suite: Vec<String>,
        /// Highest protocol version to offer (ssl3, tls1).
        #[arg(long, default_value = "tls1")]
        version: String,
        /// Send an HTTP GET after the handshake.
        #[arg(long)]
        http: bool,
    },
    /// Accept connections and echo what each client sends.
    SServer {
        /// Server certificate chain, leaf first.
        #[arg(long)]
        cert: String,
        /// Server RSA private key.
        #[arg(long)]
        key: String,
        /// Port to listen on.
        #[arg(short, long, default_value_t = 4433)]
        port: u16,
        /// Enable the DHE suites with the 2048-bit MODP group.
        #[arg(long)]
        dhe: bool,
        /// Require client certificates issued by these CAs.
        #[arg(long)]
        ca_file: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::X509 { input, text } => x509cmd::run(&input, text),
        Commands::Verify {
            ca_file,
            host,
            cert,
        } => verify::run(&ca_file, host.as_deref(), &cert),
        Commands::Genrsa { bits, output } => genrsa::run(bits, output.as_deref()),
        Commands::SClient {
            connect,
            ca_file,
            suite,
            version,
            http,
        } => s_client::run(&connect, ca_file.as_deref(), &suite, &version, http),
        Commands::SServer {
            cert,
            key,
            port,
            dhe,
            ca_file,
        } => s_server::run(port, &cert, &key, dhe, ca_file.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
