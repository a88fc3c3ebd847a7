//! README and deployment instructions, authored fresh for every package

use forge_common::{DeploymentTarget, DisplayName, Result};
use std::fs;
use std::path::Path;

pub const README_FILE: &str = "README.md";
pub const DEPLOYMENT_FILE: &str = "DEPLOYMENT.md";

pub fn readme(name: &DisplayName) -> String {
    format!(
        r#"# {name}

A URL shortening service that allows users to create shortened links and track their performance.

## Features

- URL shortening - converting long URLs into compact, shareable links
- Statistics tracking - collecting data on clicks, browsers, and platforms
- Visualization - displaying click data through interactive charts and graphs
- Export functionality - allowing users to download stats in various formats (JSON, CSV, XLSX)
- API access - enabling programmatic interaction with the service

## Deployment

Please see the DEPLOYMENT.md file for detailed deployment instructions.
"#
    )
}

pub fn deployment_instructions(name: &DisplayName, target: DeploymentTarget) -> String {
    let slug = name.slug();
    let body = match target {
        DeploymentTarget::Containerized => format!(
            r#"## Docker Deployment

1. Make sure you have Docker and Docker Compose installed on your system.
2. Navigate to the {slug} directory.
3. Create a `.env` file with your MongoDB connection string:
   ```
   MONGODB_URI=mongodb://mongo:27017/urlshortener
   ```
4. Run the following command to start the application:
   ```
   docker-compose up -d
   ```
5. The {name} will be available at http://localhost:8000

To stop the application, run:
```
docker-compose down
```

## Customization Options

- To change the port, edit the `docker-compose.yml` file and update the port mapping.
- To use an external MongoDB database, update the MONGODB_URI in the `.env` file.
"#
        ),
        DeploymentTarget::ManagedCloud => format!(
            r#"## Azure Deployment

Your {name} is packaged for Azure App Service (Linux).

### Accessing Your Deployed Application
- The URL of your application is shown once the deployment is complete.
- The application runs on a Free Azure App Service plan.

### Managing Your Application
1. Log in to the [Azure Portal](https://portal.azure.com)
2. Navigate to "App Services" to find your application
3. From there you can:
   - View application logs
   - Monitor performance
   - Configure settings
   - Scale up if needed

### Manual Deployment
If automatic deployment did not complete, deploy this archive with the Azure CLI:
```
az webapp deployment source config-zip --resource-group <group> --name <app> --src {slug}_url_shortener.zip
```

### MongoDB Database
- The connection string is stored in the `MONGODB_URI` application setting.

### Custom Domain (Optional)
1. Go to your App Service in the Azure Portal
2. Select "Custom domains" from the left navigation
3. Follow the instructions to add and verify your domain

### SSL Certificate (Optional)
1. In your App Service, select "TLS/SSL settings"
2. Use a free Azure-managed certificate or upload your own
"#
        ),
        DeploymentTarget::Standalone => format!(
            r#"## Standalone Python Deployment

1. Make sure you have Python 3.8+ installed on your system.
2. Navigate to the {slug} directory.
3. Install the required dependencies:
   ```
   pip install -r requirements.txt
   ```
4. Install and start MongoDB on your system, or use a cloud MongoDB service.
5. Create a `.env` file with your MongoDB connection string:
   ```
   MONGODB_URI=mongodb://localhost:27017/urlshortener
   ```
   Or if using a cloud service:
   ```
   MONGODB_URI=mongodb+srv://<username>:<password>@<cluster>.mongodb.net/urlshortener
   ```
6. Run the application:
   ```
   python main.py
   ```
7. The {name} will be available at http://localhost:8000

## Customization Options

- To change the port, edit the `main.py` file and update the port number in the `app.run()` function.
- To configure the application for production, consider using a WSGI server like Gunicorn.
"#
        ),
    };

    format!("# {name} Deployment Instructions\n\n{body}")
}

/// Write both documents into the site root
pub fn write(site_root: &Path, name: &DisplayName, target: DeploymentTarget) -> Result<()> {
    fs::write(site_root.join(README_FILE), readme(name))?;
    fs::write(site_root.join(DEPLOYMENT_FILE), deployment_instructions(name, target))?;
    Ok(())
}
