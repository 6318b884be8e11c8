use rustgalerkin::bases::Family;
use rustgalerkin::problems::{
    FourierPoisson, MixedPoisson, OrrSommerfeld, SphereHelmholtz, UnitDiscHelmholtz,
};
use rustgalerkin::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let summary = FourierPoisson::new(&[16]).solve()?;
    println!("fourier poisson 1D   L2 error {:.6e}", summary.l2_error);
    let summary = FourierPoisson::default().solve()?;
    println!(
        "fourier poisson 3D   L2 error {:.6e} (points {:.6e})",
        summary.l2_error, summary.point_error
    );
    let summary = FourierPoisson::new(&[8, 10, 12, 14, 12]).solve()?;
    println!("fourier poisson 5D   L2 error {:.6e}", summary.l2_error);

    for family in [Family::Chebyshev, Family::Legendre, Family::ChebyshevU] {
        let e = MixedPoisson::new(24, family).solve()?;
        println!(
            "mixed poisson {:<10} u {:.4e} dudx {:.4e} dudy {:.4e}",
            format!("{:?}", family),
            e.u,
            e.dudx,
            e.dudy
        );
    }

    let os = OrrSommerfeld::default();
    let pairs = os.solve(None)?;
    if let Some((value, _)) = pairs.nth(0) {
        println!("orr-sommerfeld       eigenvalue {:.16e}", value);
    }

    let e = UnitDiscHelmholtz::default().solve()?;
    println!(
        "unit disc            L2 error {:.6e} gradient {:.6e}",
        e.u, e.gradient
    );
    let error = SphereHelmholtz::default().solve()?;
    println!("sphere helmholtz     L2 error {:.6e}", error);
    Ok(())
}
