use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use dns_stub::cache::Cache;
use dns_stub::config::ResolverConfig;
use dns_stub::resolver::{ResolveError, ResolveOptions, Resolver};
use dns_stub::transport::{Nameserver, SystemTransport};
use dns_wire::message::types::{Message, RdataClass, RdataType, RecordData, ResourceRecord};
use dns_wire::name::Name;

fn render_rdata(rdata: &RecordData) -> String {
    match rdata {
        RecordData::A { address } => address.to_string(),
        RecordData::Aaaa { address } => address.to_string(),
        RecordData::Ns { nsdname } => nsdname.to_string(),
        RecordData::Cname { cname } => cname.to_string(),
        RecordData::Ptr { ptrdname } => ptrdname.to_string(),
        RecordData::Mx {
            preference,
            exchange,
        } => format!("{preference} {exchange}"),
        RecordData::Soa {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => format!("{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"),
        RecordData::Txt { octets } => format!("{octets:?}"),
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => format!("{priority} {weight} {port} {target}"),
        RecordData::Svcb {
            priority, target, ..
        } => format!("{priority} {target}"),
        RecordData::Opt { .. } => String::new(),
        RecordData::Opaque { octets, .. } => format!("{octets:?}"),
    }
}

fn print_section(heading: &str, rrs: &[ResourceRecord]) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading}");
    for rr in rrs {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            rr.name,
            rr.ttl,
            rr.rclass,
            rr.rtype(),
            render_rdata(&rr.rdata)
        );
    }
}

fn print_response(response: &Message) {
    print_section("ANSWER", &response.answers);
    print_section("AUTHORITY", &response.authority);
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS stub lookup utility
///
/// Sends a query to the configured nameservers and prints the
/// response sections.  Nameservers come from --server flags or from a
/// resolv.conf-format file.
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    domain: String,

    /// Query type to resolve
    #[clap(default_value = "A", value_parser)]
    qtype: RdataType,

    /// Nameserver address, can be specified more than once
    #[clap(short, long, value_parser)]
    server: Vec<IpAddr>,

    /// Nameserver port
    #[clap(short, long, default_value_t = 53, value_parser)]
    port: u16,

    /// Path to a resolv.conf-format file to read configuration from
    #[clap(short, long, value_parser)]
    resolv_conf: Option<PathBuf>,

    /// Use TCP for the query
    #[clap(long, action(clap::ArgAction::SetTrue))]
    tcp: bool,

    /// Attach an EDNS OPT record to the query
    #[clap(long, action(clap::ArgAction::SetTrue))]
    edns: bool,

    /// Do not apply the configured search list
    #[clap(long, action(clap::ArgAction::SetTrue))]
    no_search: bool,

    /// Total time budget for the lookup, in seconds
    #[clap(short, long, value_parser)]
    lifetime: Option<f64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let qname = match args.domain.parse::<Name>() {
        Ok(name) => name,
        Err(err) => {
            eprintln!("bad domain name: {err}");
            process::exit(2);
        }
    };

    let mut config = ResolverConfig {
        port: args.port,
        edns: args.edns,
        ..ResolverConfig::default()
    };
    if let Some(path) = &args.resolv_conf {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("could not read {}: {err}", path.display());
                process::exit(2);
            }
        };
        if let Err(err) = config.read_resolv_conf(&text) {
            eprintln!("could not parse {}: {err}", path.display());
            process::exit(2);
        }
    }
    for address in &args.server {
        config.nameservers.push(Nameserver::do53(*address, args.port));
    }
    if config.nameservers.is_empty() {
        eprintln!("no nameservers: give --server or --resolv-conf");
        process::exit(2);
    }

    let mut resolver = Resolver::new(config, SystemTransport);
    resolver.set_cache(Arc::new(Cache::new()));

    let options = ResolveOptions {
        tcp: args.tcp,
        raise_on_no_answer: false,
        lifetime: args.lifetime.map(Duration::from_secs_f64),
        search: if args.no_search { Some(false) } else { None },
    };

    println!(";; QUESTION");
    println!("{}\tIN\t{}", qname, args.qtype);

    match resolver
        .resolve(&qname, args.qtype, RdataClass::IN, options)
        .await
    {
        Ok(answer) => {
            print_response(&answer.response);
            if answer.rrset.is_none() {
                println!("\n;; no records of type {}", args.qtype);
            }
        }
        Err(ResolveError::NxDomain(nx)) => {
            println!("\n;; ANSWER");
            println!("; name does not exist");
            for qname in nx.qnames() {
                if let Some(response) = nx.response(qname) {
                    print_response(response);
                }
            }
            process::exit(1);
        }
        Err(err) => {
            println!("\n;; ANSWER");
            println!("; {err}");
            process::exit(1);
        }
    }
}
